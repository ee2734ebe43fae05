/// Errors from submitting or confirming escrow transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was broadcast but following it up failed, so whether
    /// it will be mined is not known.
    #[error("transaction {tx_hash} submitted but not confirmed: {reason}")]
    Unconfirmed { tx_hash: String, reason: String },

    /// The node could not be reached or the HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// No confirmation arrived within the configured wait.
    #[error("timed out after {waited_secs}s waiting for confirmation")]
    Timeout {
        tx_hash: Option<String>,
        waited_secs: u64,
    },

    /// Wallet or contract settings are missing or malformed.
    #[error("chain gateway misconfigured: {0}")]
    Misconfigured(String),

    /// The node returned something that does not parse.
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
}

impl ChainError {
    /// The transaction hash this error refers to, when one was assigned.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            ChainError::Reverted { tx_hash } => Some(tx_hash),
            ChainError::Timeout { tx_hash, .. } => tx_hash.as_deref(),
            ChainError::Unconfirmed { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }

    /// Whether the contract rejected the call, either in a mined transaction
    /// or during the node's gas estimation (`execution reverted`).
    pub fn is_revert(&self) -> bool {
        match self {
            ChainError::Reverted { .. } => true,
            ChainError::Rpc { code, message } => {
                *code == 3 || message.to_ascii_lowercase().contains("execution reverted")
            }
            _ => false,
        }
    }
}
