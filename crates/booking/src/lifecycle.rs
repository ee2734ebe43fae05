//! Booking status transition table.

use careescrow_storage::BookingStatus;

/// Whether `from → to` is a legal step of the booking lifecycle.
///
/// `pending → confirmed`, `in_review → completed` and `confirmed → cancelled`
/// additionally require a confirmed escrow transaction; this table only
/// captures the ordering.
pub fn can_advance(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, InReview)
            | (InReview, Completed)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
    )
}

/// `completed` and `cancelled` accept no further transitions.
pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Completed | BookingStatus::Cancelled)
}

/// Statuses reachable from `from` in one step.
pub fn successors(from: BookingStatus) -> Vec<BookingStatus> {
    BookingStatus::ALL
        .into_iter()
        .filter(|to| can_advance(from, *to))
        .collect()
}
