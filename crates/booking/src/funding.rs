//! Funding outcome of a `pending` booking.
//!
//! While a booking is `pending` the last line of its notes is written by
//! the orchestrator and records how far the `createBooking` transaction
//! got. Customer notes always sit above that line, so they cannot stand
//! in for it.

use careescrow_chain::ChainError;

/// Notes line while the funding transaction has no known outcome.
pub(crate) const PENDING_NOTE: &str = "Processing Blockchain Transaction...";

const NOT_FUNDED_NOTE: &str = "Funding Failed.";
const SUBMITTED_PREFIX: &str = "Funding Unconfirmed. Tx: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FundingState {
    /// No outcome recorded: the call is running, or it failed in a way
    /// that may still have broadcast a transaction.
    InFlight,
    /// The contract holds nothing for this booking: the node refused the
    /// call or the transaction reverted.
    NotFunded,
    /// Broadcast as `tx_hash`, outcome unknown when the call returned.
    Submitted(String),
}

impl FundingState {
    /// What a failed `createBooking` call leaves behind.
    pub(crate) fn after_failure(error: &ChainError) -> Self {
        match error {
            ChainError::Reverted { .. } | ChainError::Rpc { .. } | ChainError::Misconfigured(_) => {
                FundingState::NotFunded
            }
            ChainError::Timeout {
                tx_hash: Some(tx_hash),
                ..
            }
            | ChainError::Unconfirmed { tx_hash, .. } => FundingState::Submitted(tx_hash.clone()),
            ChainError::Timeout { tx_hash: None, .. }
            | ChainError::Transport(_)
            | ChainError::InvalidResponse(_) => FundingState::InFlight,
        }
    }

    pub(crate) fn from_notes(notes: Option<&str>) -> Self {
        let last = notes.and_then(|n| n.lines().last()).unwrap_or("");
        if last == NOT_FUNDED_NOTE {
            return FundingState::NotFunded;
        }
        match last.strip_prefix(SUBMITTED_PREFIX) {
            Some(tx_hash) if !tx_hash.is_empty() => FundingState::Submitted(tx_hash.to_string()),
            _ => FundingState::InFlight,
        }
    }

    fn line(&self) -> String {
        match self {
            FundingState::InFlight => PENDING_NOTE.to_string(),
            FundingState::NotFunded => NOT_FUNDED_NOTE.to_string(),
            FundingState::Submitted(tx_hash) => format!("{}{}", SUBMITTED_PREFIX, tx_hash),
        }
    }
}

/// Notes for a `pending` booking: the customer's notes, then the state line.
pub(crate) fn pending_notes(customer_notes: Option<&str>, state: &FundingState) -> String {
    match customer_notes {
        Some(notes) => format!("{}\n{}", notes, state.line()),
        None => state.line(),
    }
}
