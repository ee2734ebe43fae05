use std::future::Future;

use super::{make_booking, make_service, seed, TestResult};
use crate::record::BookingStatus;
use crate::{BookingStore, StorageError};

pub(super) async fn run_booking_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "bookings",
        "insert_booking_lands_in_pending",
        insert_booking_lands_in_pending(factory).await,
    ));
    results.push(TestResult::from_result(
        "bookings",
        "insert_booking_requires_user_row",
        insert_booking_requires_user_row(factory).await,
    ));
    results.push(TestResult::from_result(
        "bookings",
        "insert_booking_requires_service_row",
        insert_booking_requires_service_row(factory).await,
    ));
    results.push(TestResult::from_result(
        "bookings",
        "list_by_user_orders_by_schedule",
        list_by_user_orders_by_schedule(factory).await,
    ));
    results.push(TestResult::from_result(
        "bookings",
        "list_by_services_newest_first",
        list_by_services_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "bookings",
        "get_missing_booking_returns_booking_not_found",
        get_missing_booking_returns_booking_not_found(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn insert_booking_lands_in_pending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let service = seed(&s).await?;
    let booking = s
        .insert_booking(make_booking("customer-1", &service.id, "2025-06-01T10:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    if booking.status != BookingStatus::Pending {
        return Err(format!("expected pending, got {}", booking.status));
    }
    if booking.id.is_empty() {
        return Err("booking id must be generated".to_string());
    }
    let read = s.get_booking(&booking.id).await.map_err(|e| e.to_string())?;
    if read != booking {
        return Err(format!("read {:?} differs from inserted {:?}", read, booking));
    }
    Ok(())
}

async fn insert_booking_requires_user_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let service = seed(&s).await?;
    match s
        .insert_booking(make_booking("nobody", &service.id, "2025-06-01T10:00:00Z"))
        .await
    {
        Err(StorageError::ForeignKeyViolation { column, .. }) if column == "user_id" => Ok(()),
        other => Err(format!("expected ForeignKeyViolation on user_id, got {:?}", other)),
    }
}

async fn insert_booking_requires_service_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s).await?;
    match s
        .insert_booking(make_booking("customer-1", "ghost", "2025-06-01T10:00:00Z"))
        .await
    {
        Err(StorageError::ForeignKeyViolation { column, .. }) if column == "service_id" => Ok(()),
        other => Err(format!(
            "expected ForeignKeyViolation on service_id, got {:?}",
            other
        )),
    }
}

async fn list_by_user_orders_by_schedule<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let service = seed(&s).await?;
    for at in [
        "2025-06-03T09:00:00Z",
        "2025-06-01T09:00:00Z",
        "2025-06-02T09:00:00Z",
    ] {
        s.insert_booking(make_booking("customer-1", &service.id, at))
            .await
            .map_err(|e| e.to_string())?;
    }

    let listed = s
        .list_bookings_by_user("customer-1")
        .await
        .map_err(|e| e.to_string())?;
    let order: Vec<&str> = listed.iter().map(|b| b.scheduled_at.as_str()).collect();
    if order
        != [
            "2025-06-01T09:00:00Z",
            "2025-06-02T09:00:00Z",
            "2025-06-03T09:00:00Z",
        ]
    {
        return Err(format!("unexpected order {:?}", order));
    }
    if !s
        .list_bookings_by_user("someone-else")
        .await
        .map_err(|e| e.to_string())?
        .is_empty()
    {
        return Err("bookings leaked across users".to_string());
    }
    Ok(())
}

async fn list_by_services_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let service = seed(&s).await?;
    let other = s
        .insert_service(make_service("provider-1", "Driver"))
        .await
        .map_err(|e| e.to_string())?;

    // Back-to-back inserts land within the same second.
    let mut inserted = Vec::new();
    for n in 0..5 {
        let service_id = if n % 2 == 0 { &service.id } else { &other.id };
        let booking = s
            .insert_booking(make_booking("customer-1", service_id, "2025-06-01T09:00:00Z"))
            .await
            .map_err(|e| e.to_string())?;
        inserted.push(booking.id);
    }

    let listed = s
        .list_bookings_by_services(&[service.id.clone(), other.id.clone()])
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|b| b.id.as_str()).collect();
    let expected: Vec<&str> = inserted.iter().rev().map(String::as_str).collect();
    if ids != expected {
        return Err(format!("expected newest first {:?}, got {:?}", expected, ids));
    }

    let only_first = s
        .list_bookings_by_services(&[service.id.clone()])
        .await
        .map_err(|e| e.to_string())?;
    let only_first_ids: Vec<&str> = only_first.iter().map(|b| b.id.as_str()).collect();
    if only_first_ids != [inserted[4].as_str(), inserted[2].as_str(), inserted[0].as_str()] {
        return Err(format!("service filter not applied: {:?}", only_first_ids));
    }
    Ok(())
}

async fn get_missing_booking_returns_booking_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_booking("ghost").await {
        Err(StorageError::BookingNotFound { booking_id }) if booking_id == "ghost" => Ok(()),
        other => Err(format!("expected BookingNotFound, got {:?}", other)),
    }
}
