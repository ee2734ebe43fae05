use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A 20-byte EVM account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("address '{}' must start with 0x", s))?;
        if digits.len() != 40 {
            return Err(format!("address '{}' must have 40 hex digits", s));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| format!("address '{}' is not hex: {}", s, e))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// A mined transaction that reached the required confirmation depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub confirmations: u64,
}

/// Where a submitted transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The node does not know the hash: never broadcast, or evicted from
    /// the mempool.
    Unknown,
    /// Broadcast and not yet mined.
    Pending,
    /// Mined with a failed status.
    Reverted,
    /// Mined successfully.
    Mined { block_number: u64 },
}

/// Render a wei amount in ether, trimming trailing zeros.
///
/// Returns `None` when the amount does not fit a 96-bit decimal mantissa
/// (roughly 79 billion ether).
pub fn wei_to_ether(wei: u128) -> Option<Decimal> {
    let wei = i128::try_from(wei).ok()?;
    Decimal::try_from_i128_with_scale(wei, 18)
        .ok()
        .map(|d| d.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_case_address() {
        let addr: Address = "0x000000000000000000000000000000000000dEaD".parse().unwrap();
        assert_eq!(addr.to_string(), "0x000000000000000000000000000000000000dead");
    }

    #[test]
    fn rejects_short_address() {
        assert!("0xdead".parse::<Address>().is_err());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("000000000000000000000000000000000000dEaD"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn address_round_trips_through_json() {
        let addr: Address = serde_json::from_str("\"0x000000000000000000000000000000000000dEaD\"").unwrap();
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"0x000000000000000000000000000000000000dead\""
        );
    }

    #[test]
    fn one_micro_ether() {
        assert_eq!(wei_to_ether(1_000_000_000_000).unwrap().to_string(), "0.000001");
    }

    #[test]
    fn whole_ether() {
        assert_eq!(
            wei_to_ether(2_500_000_000_000_000_000).unwrap().to_string(),
            "2.5"
        );
    }
}
