//! Calldata encoding for the escrow contract.
//!
//! Every call is a 4-byte selector (first bytes of the Keccak-256 digest of
//! the canonical signature) followed by one 32-byte word per argument.
//! `uint256` words are big-endian; addresses are left-padded with zeros.

use crate::key::{keccak256, EscrowKey};
use crate::types::Address;

pub const CREATE_BOOKING: &str = "createBooking(uint256,address)";
pub const RELEASE_FUNDS: &str = "releaseFunds(uint256)";
pub const REFUND: &str = "refund(uint256)";
pub const BOOKING_CREATED_EVENT: &str = "BookingCreated(uint256,address,uint256)";

/// First four bytes of the signature hash.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// `topic0` of an event log.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// A call to one of the escrow contract's entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowCall {
    CreateBooking { key: EscrowKey, provider: Address },
    ReleaseFunds { key: EscrowKey },
    Refund { key: EscrowKey },
}

impl EscrowCall {
    pub fn signature(&self) -> &'static str {
        match self {
            EscrowCall::CreateBooking { .. } => CREATE_BOOKING,
            EscrowCall::ReleaseFunds { .. } => RELEASE_FUNDS,
            EscrowCall::Refund { .. } => REFUND,
        }
    }

    pub fn key(&self) -> &EscrowKey {
        match self {
            EscrowCall::CreateBooking { key, .. }
            | EscrowCall::ReleaseFunds { key }
            | EscrowCall::Refund { key } => key,
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 64);
        data.extend_from_slice(&selector(self.signature()));
        data.extend_from_slice(self.key().as_bytes());
        if let EscrowCall::CreateBooking { provider, .. } = self {
            data.extend_from_slice(&address_word(provider));
        }
        data
    }

    /// Calldata as a `0x`-prefixed hex string for JSON-RPC.
    pub fn calldata_hex(&self) -> String {
        format!("0x{}", hex::encode(self.calldata()))
    }
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}
