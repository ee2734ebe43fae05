use crate::record::BookingStatus;

/// All errors that can be returned by a BookingStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No `users` row with the given id.
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },

    /// No `services` row with the given id.
    #[error("service not found: {service_id}")]
    ServiceNotFound { service_id: String },

    /// No `bookings` row with the given id.
    #[error("booking not found: {booking_id}")]
    BookingNotFound { booking_id: String },

    /// A row references a parent row that does not exist.
    #[error("foreign key violation: {table}.{column} = {value}")]
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// Compare-and-set on `bookings.status` failed: the row was not in the
    /// status the caller expected.
    #[error("status conflict on booking {booking_id}: expected {expected}, found {found}")]
    StatusConflict {
        booking_id: String,
        expected: BookingStatus,
        found: BookingStatus,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
