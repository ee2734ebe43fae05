use std::future::Future;

use super::{make_booking, seed, TestResult};
use crate::record::{BookingRecord, BookingStatus};
use crate::{BookingStore, StorageError};

pub(super) async fn run_status_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "status",
        "transition_from_expected_status_succeeds",
        transition_from_expected_status_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "transition_from_stale_status_conflicts",
        transition_from_stale_status_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "conflicting_transition_leaves_row_untouched",
        conflicting_transition_leaves_row_untouched(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "transition_without_notes_keeps_notes",
        transition_without_notes_keeps_notes(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "set_status_is_unconditional",
        set_status_is_unconditional(factory).await,
    ));
    results.push(TestResult::from_result(
        "status",
        "status_writes_on_missing_booking_return_not_found",
        status_writes_on_missing_booking_return_not_found(factory).await,
    ));

    results
}

async fn pending_booking<S: BookingStore>(s: &S) -> Result<BookingRecord, String> {
    let service = seed(s).await?;
    s.insert_booking(make_booking("customer-1", &service.id, "2025-06-01T10:00:00Z"))
        .await
        .map_err(|e| e.to_string())
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn transition_from_expected_status_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let booking = pending_booking(&s).await?;
    let updated = s
        .transition_booking(
            &booking.id,
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            Some("Tx Hash: 0xabc".to_string()),
        )
        .await
        .map_err(|e| e.to_string())?;
    if updated.status != BookingStatus::Confirmed {
        return Err(format!("expected confirmed, got {}", updated.status));
    }
    let read = s.get_booking(&booking.id).await.map_err(|e| e.to_string())?;
    if read.notes.as_deref() != Some("Tx Hash: 0xabc") {
        return Err(format!("notes not persisted: {:?}", read.notes));
    }
    Ok(())
}

async fn transition_from_stale_status_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let booking = pending_booking(&s).await?;
    match s
        .transition_booking(
            &booking.id,
            BookingStatus::InReview,
            BookingStatus::Completed,
            None,
        )
        .await
    {
        Err(StorageError::StatusConflict {
            expected, found, ..
        }) if expected == BookingStatus::InReview && found == BookingStatus::Pending => Ok(()),
        other => Err(format!("expected StatusConflict, got {:?}", other)),
    }
}

async fn conflicting_transition_leaves_row_untouched<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let booking = pending_booking(&s).await?;
    let _ = s
        .transition_booking(
            &booking.id,
            BookingStatus::Confirmed,
            BookingStatus::InReview,
            Some("should not land".to_string()),
        )
        .await;
    let read = s.get_booking(&booking.id).await.map_err(|e| e.to_string())?;
    if read != booking {
        return Err(format!("row changed after conflict: {:?}", read));
    }
    Ok(())
}

async fn transition_without_notes_keeps_notes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let booking = pending_booking(&s).await?;
    s.transition_booking(
        &booking.id,
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        Some("Tx Hash: 0x1".to_string()),
    )
    .await
    .map_err(|e| e.to_string())?;
    let updated = s
        .transition_booking(
            &booking.id,
            BookingStatus::Confirmed,
            BookingStatus::InReview,
            None,
        )
        .await
        .map_err(|e| e.to_string())?;
    if updated.notes.as_deref() != Some("Tx Hash: 0x1") {
        return Err(format!("notes were dropped: {:?}", updated.notes));
    }
    Ok(())
}

async fn set_status_is_unconditional<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let booking = pending_booking(&s).await?;
    let updated = s
        .set_booking_status(&booking.id, BookingStatus::Completed)
        .await
        .map_err(|e| e.to_string())?;
    if updated.status != BookingStatus::Completed {
        return Err(format!("expected completed, got {}", updated.status));
    }
    Ok(())
}

async fn status_writes_on_missing_booking_return_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .transition_booking(
            "ghost",
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            None,
        )
        .await
    {
        Err(StorageError::BookingNotFound { .. }) => {}
        other => return Err(format!("transition: expected BookingNotFound, got {:?}", other)),
    }
    match s
        .set_booking_status("ghost", BookingStatus::Cancelled)
        .await
    {
        Err(StorageError::BookingNotFound { .. }) => Ok(()),
        other => Err(format!("set: expected BookingNotFound, got {:?}", other)),
    }
}
