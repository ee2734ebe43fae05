use std::collections::HashMap;

use careescrow_chain::Address;

/// 0.000001 ether.
pub const DEFAULT_STAKE_WEI: u128 = 1_000_000_000_000;

/// Payout address used when a provider has no registered wallet.
pub const DEFAULT_PAYOUT_ADDRESS: Address = Address::from_bytes([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad,
]);

/// How much is staked per booking and where released funds go.
#[derive(Debug, Clone)]
pub struct EscrowPolicy {
    pub stake_wei: u128,
    pub default_payout_address: Address,
    /// Provider user id → payout wallet.
    pub payout_addresses: HashMap<String, Address>,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            stake_wei: DEFAULT_STAKE_WEI,
            default_payout_address: DEFAULT_PAYOUT_ADDRESS,
            payout_addresses: HashMap::new(),
        }
    }
}

impl EscrowPolicy {
    /// Payout address for a service's provider.
    pub fn payout_for(&self, provider_id: Option<&str>) -> Address {
        provider_id
            .and_then(|id| self.payout_addresses.get(id))
            .copied()
            .unwrap_or(self.default_payout_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payout_is_the_dead_address() {
        assert_eq!(
            DEFAULT_PAYOUT_ADDRESS.to_string(),
            "0x000000000000000000000000000000000000dead"
        );
        assert_eq!(EscrowPolicy::default().stake_wei, 1_000_000_000_000);
    }

    #[test]
    fn registered_wallet_wins() {
        let wallet: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let mut policy = EscrowPolicy::default();
        policy.payout_addresses.insert("provider-1".to_string(), wallet);

        assert_eq!(policy.payout_for(Some("provider-1")), wallet);
        assert_eq!(policy.payout_for(Some("provider-2")), DEFAULT_PAYOUT_ADDRESS);
        assert_eq!(policy.payout_for(None), DEFAULT_PAYOUT_ADDRESS);
    }
}
