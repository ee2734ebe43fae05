use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    BookingRecord, BookingStatus, NewBooking, NewService, NewUser, ServiceRecord, UserRecord,
};

/// The persistence gateway for the booking marketplace.
///
/// A `BookingStore` owns the `users`, `services` and `bookings` tables and
/// performs pure CRUD. It carries no business rules beyond the row-level
/// constraints a relational store would enforce:
///
/// - primary keys are unique (`upsert_user` never creates a second row)
/// - `bookings.user_id` references `users.id`
/// - `bookings.service_id` references `services.id`
/// - `services.provider_id` references `users.id`
///
/// Identifiers for services and bookings are generated by the store.
///
/// ## Status writes
///
/// `transition_booking` is a compare-and-set on `bookings.status`:
/// `UPDATE ... WHERE id = $1 AND status = $expected`. If zero rows are
/// affected because the status moved, it returns
/// `Err(StorageError::StatusConflict { .. })`. `set_booking_status` is the
/// unconditional form.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    // ── Users ────────────────────────────────────────────────────────────────

    /// Insert the user if absent, otherwise merge into the existing row.
    ///
    /// Merging fills `email`/`name` that are still empty and promotes a
    /// `customer` to `provider` when `user.role` is `provider`. Other role
    /// changes are ignored. Returns the stored row and whether it was created.
    async fn upsert_user(&self, user: NewUser) -> Result<(UserRecord, bool), StorageError>;

    /// Returns `Err(StorageError::UserNotFound)` if the user does not exist.
    async fn get_user(&self, user_id: &str) -> Result<UserRecord, StorageError>;

    // ── Services ─────────────────────────────────────────────────────────────

    /// Insert a service owned by `service.provider_id`.
    ///
    /// Returns `Err(StorageError::ForeignKeyViolation)` if the provider has
    /// no `users` row.
    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord, StorageError>;

    /// Returns `Err(StorageError::ServiceNotFound)` if the service does not exist.
    async fn get_service(&self, service_id: &str) -> Result<ServiceRecord, StorageError>;

    /// All services owned by a provider, oldest first.
    async fn list_services_by_provider(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ServiceRecord>, StorageError>;

    // ── Bookings ─────────────────────────────────────────────────────────────

    /// Insert a booking in `pending` status.
    ///
    /// Returns `Err(StorageError::ForeignKeyViolation)` if either the user
    /// or the service does not exist.
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingRecord, StorageError>;

    /// Returns `Err(StorageError::BookingNotFound)` if the booking does not exist.
    async fn get_booking(&self, booking_id: &str) -> Result<BookingRecord, StorageError>;

    /// A customer's bookings ordered by `scheduled_at` ascending.
    async fn list_bookings_by_user(&self, user_id: &str)
        -> Result<Vec<BookingRecord>, StorageError>;

    /// Bookings for any of the given services, most recently inserted first.
    async fn list_bookings_by_services(
        &self,
        service_ids: &[String],
    ) -> Result<Vec<BookingRecord>, StorageError>;

    /// Move a booking from `expected` to `new_status`, optionally replacing
    /// its notes. Compare-and-set: see the trait docs.
    async fn transition_booking(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        new_status: BookingStatus,
        notes: Option<String>,
    ) -> Result<BookingRecord, StorageError>;

    /// Set a booking's status regardless of its current value.
    async fn set_booking_status(
        &self,
        booking_id: &str,
        new_status: BookingStatus,
    ) -> Result<BookingRecord, StorageError>;
}
