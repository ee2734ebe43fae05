use std::fmt;

use sha3::{Digest, Keccak256};

/// On-chain identity of a booking's escrow.
///
/// The contract keys escrows by `uint256`. The key is the Keccak-256 digest
/// of the booking id's UTF-8 bytes, read as a big-endian integer, so the
/// off-chain id maps to exactly one on-chain slot without a lookup table.
/// Collisions are not handled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EscrowKey([u8; 32]);

impl EscrowKey {
    /// Derive the escrow key for a booking id.
    pub fn derive(booking_id: &str) -> Self {
        Self(keccak256(booking_id.as_bytes()))
    }

    /// Big-endian `uint256` word, as it appears in calldata.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EscrowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EscrowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EscrowKey({})", self.to_hex())
    }
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input_matches_reference() {
        assert_eq!(
            EscrowKey::derive("").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let id = "3f1c2a9e-8d5b-4c7e-9a1f-0b2c3d4e5f60";
        assert_eq!(EscrowKey::derive(id), EscrowKey::derive(id));
    }

    #[test]
    fn distinct_ids_give_distinct_keys() {
        assert_ne!(EscrowKey::derive("booking-a"), EscrowKey::derive("booking-b"));
    }

    #[test]
    fn hex_form_is_a_full_word() {
        let hex = EscrowKey::derive("booking-a").to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
    }
}
