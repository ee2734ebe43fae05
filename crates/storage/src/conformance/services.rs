use std::future::Future;

use super::{make_service, make_user, TestResult};
use crate::record::Role;
use crate::{BookingStore, StorageError};

pub(super) async fn run_service_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "services",
        "insert_service_generates_id",
        insert_service_generates_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "services",
        "insert_service_requires_provider_row",
        insert_service_requires_provider_row(factory).await,
    ));
    results.push(TestResult::from_result(
        "services",
        "list_services_filters_by_provider",
        list_services_filters_by_provider(factory).await,
    ));
    results.push(TestResult::from_result(
        "services",
        "get_missing_service_returns_service_not_found",
        get_missing_service_returns_service_not_found(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn insert_service_generates_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.upsert_user(make_user("p1", Role::Provider))
        .await
        .map_err(|e| e.to_string())?;
    let a = s
        .insert_service(make_service("p1", "A"))
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .insert_service(make_service("p1", "B"))
        .await
        .map_err(|e| e.to_string())?;
    if a.id.is_empty() || a.id == b.id {
        return Err(format!("expected distinct non-empty ids, got {} and {}", a.id, b.id));
    }
    let read = s.get_service(&a.id).await.map_err(|e| e.to_string())?;
    if read.provider_id.as_deref() != Some("p1") {
        return Err(format!("wrong provider on read: {:?}", read.provider_id));
    }
    Ok(())
}

async fn insert_service_requires_provider_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.insert_service(make_service("nobody", "A")).await {
        Err(StorageError::ForeignKeyViolation { column, .. }) if column == "provider_id" => Ok(()),
        other => Err(format!("expected ForeignKeyViolation, got {:?}", other)),
    }
}

async fn list_services_filters_by_provider<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for p in ["p1", "p2"] {
        s.upsert_user(make_user(p, Role::Provider))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.insert_service(make_service("p1", "first"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_service(make_service("p2", "other"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_service(make_service("p1", "second"))
        .await
        .map_err(|e| e.to_string())?;

    let listed = s
        .list_services_by_provider("p1")
        .await
        .map_err(|e| e.to_string())?;
    let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
    if names != ["first", "second"] {
        return Err(format!("expected [first, second], got {:?}", names));
    }
    Ok(())
}

async fn get_missing_service_returns_service_not_found<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_service("ghost").await {
        Err(StorageError::ServiceNotFound { .. }) => Ok(()),
        other => Err(format!("expected ServiceNotFound, got {:?}", other)),
    }
}
