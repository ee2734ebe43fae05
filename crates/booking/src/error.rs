use careescrow_chain::ChainError;
use careescrow_storage::{BookingStatus, StorageError};

/// Failures of booking lifecycle operations.
///
/// Chain and database errors never escape as panics; each is wrapped in the
/// variant for the step that failed. A failed step never advances the
/// booking's status.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Missing or malformed request fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// The customer or provider row could not be upserted. Nothing else was written.
    #[error("failed to provision user {user_id}: {message}")]
    IdentityProvisioningFailed { user_id: String, message: String },

    /// `createBooking` failed; the booking stays `pending`.
    #[error("escrow funding failed for booking {booking_id}: {source}")]
    EscrowFundingFailed {
        booking_id: String,
        source: ChainError,
    },

    /// `releaseFunds` failed; the booking stays `in_review`.
    #[error("escrow release failed for booking {booking_id}: {source}")]
    EscrowReleaseFailed {
        booking_id: String,
        source: ChainError,
    },

    /// `refund` failed; the booking keeps its status.
    #[error("escrow refund failed for booking {booking_id}: {source}")]
    EscrowRefundFailed {
        booking_id: String,
        source: ChainError,
    },

    /// A `pending` booking's funding transaction may still be mined, so it
    /// cannot be cancelled yet. The booking stays `pending`.
    #[error("escrow funding for booking {booking_id} is unresolved{}; retry once it settles", .tx_hash.as_deref().map(|h| format!(" (tx {})", h)).unwrap_or_default())]
    FundingUnresolved {
        booking_id: String,
        tx_hash: Option<String>,
    },

    /// The acting user does not own the booking or its service.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The booking is not in a status the operation can start from.
    #[error("booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        booking_id: String,
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The chain confirmed the transaction but the status write failed.
    /// The booking must be reconciled against `tx_hash`.
    #[error("transaction {tx_hash} confirmed but booking {booking_id} was not updated: {message}")]
    ConfirmationNotRecorded {
        booking_id: String,
        tx_hash: String,
        message: String,
    },

    #[error(transparent)]
    Storage(StorageError),
}

impl BookingError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::IdentityProvisioningFailed { .. } => "IDENTITY_PROVISIONING_FAILED",
            BookingError::EscrowFundingFailed { .. } => "ESCROW_FUNDING_FAILED",
            BookingError::EscrowReleaseFailed { .. } => "ESCROW_RELEASE_FAILED",
            BookingError::EscrowRefundFailed { .. } => "ESCROW_REFUND_FAILED",
            BookingError::FundingUnresolved { .. } => "FUNDING_UNRESOLVED",
            BookingError::Unauthorized(_) => "UNAUTHORIZED",
            BookingError::NotFound { .. } => "NOT_FOUND",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::ConfirmationNotRecorded { .. } => "CONFIRMATION_NOT_RECORDED",
            BookingError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Transaction hash attached to the failure, if the chain assigned one.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            BookingError::EscrowFundingFailed { source, .. }
            | BookingError::EscrowReleaseFailed { source, .. }
            | BookingError::EscrowRefundFailed { source, .. } => source.tx_hash(),
            BookingError::ConfirmationNotRecorded { tx_hash, .. } => Some(tx_hash),
            BookingError::FundingUnresolved { tx_hash, .. } => tx_hash.as_deref(),
            _ => None,
        }
    }
}

impl From<StorageError> for BookingError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserNotFound { user_id } => BookingError::NotFound {
                entity: "user",
                id: user_id,
            },
            StorageError::ServiceNotFound { service_id } => BookingError::NotFound {
                entity: "service",
                id: service_id,
            },
            StorageError::BookingNotFound { booking_id } => BookingError::NotFound {
                entity: "booking",
                id: booking_id,
            },
            other => BookingError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_rows_map_to_not_found() {
        let err: BookingError = StorageError::BookingNotFound {
            booking_id: "b1".to_string(),
        }
        .into();
        assert!(matches!(err, BookingError::NotFound { entity: "booking", .. }));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn backend_errors_stay_storage_errors() {
        let err: BookingError = StorageError::Backend("disk full".to_string()).into();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert_eq!(err.to_string(), "storage backend error: disk full");
    }

    #[test]
    fn funding_failure_exposes_reverted_hash() {
        let err = BookingError::EscrowFundingFailed {
            booking_id: "b1".to_string(),
            source: ChainError::Reverted {
                tx_hash: "0xabc".to_string(),
            },
        };
        assert_eq!(err.tx_hash(), Some("0xabc"));
        assert!(err.to_string().contains("0xabc"));
    }

    #[test]
    fn unresolved_funding_names_its_transaction() {
        let err = BookingError::FundingUnresolved {
            booking_id: "b1".to_string(),
            tx_hash: Some("0xabc".to_string()),
        };
        assert_eq!(err.code(), "FUNDING_UNRESOLVED");
        assert_eq!(err.tx_hash(), Some("0xabc"));
        assert!(err.to_string().contains("(tx 0xabc)"));

        let err = BookingError::FundingUnresolved {
            booking_id: "b1".to_string(),
            tx_hash: None,
        };
        assert_eq!(
            err.to_string(),
            "escrow funding for booking b1 is unresolved; retry once it settles"
        );
    }
}
