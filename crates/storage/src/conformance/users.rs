use std::future::Future;

use super::{make_user, TestResult};
use crate::record::{NewUser, Role};
use crate::{BookingStore, StorageError};

pub(super) async fn run_user_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "users",
        "upsert_creates_user",
        upsert_creates_user(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "upsert_is_idempotent_on_id",
        upsert_is_idempotent_on_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "upsert_fills_missing_email",
        upsert_fills_missing_email(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "upsert_keeps_existing_email",
        upsert_keeps_existing_email(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "upsert_promotes_customer_to_provider",
        upsert_promotes_customer_to_provider(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "upsert_never_demotes_provider",
        upsert_never_demotes_provider(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "get_missing_user_returns_user_not_found",
        get_missing_user_returns_user_not_found(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// First upsert reports creation and the row is readable.
async fn upsert_creates_user<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (user, created) = s
        .upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    if !created {
        return Err("first upsert must report created = true".to_string());
    }
    let read = s.get_user("u1").await.map_err(|e| e.to_string())?;
    if read != user {
        return Err(format!("read {:?} differs from upserted {:?}", read, user));
    }
    Ok(())
}

/// Upserting the same id twice leaves one row and reports created = false.
async fn upsert_is_idempotent_on_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (first, _) = s
        .upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    let (second, created) = s
        .upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    if created {
        return Err("second upsert must report created = false".to_string());
    }
    if first.created_at != second.created_at {
        return Err("second upsert must not recreate the row".to_string());
    }
    Ok(())
}

async fn upsert_fills_missing_email<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    let (user, _) = s
        .upsert_user(NewUser {
            email: Some("u1@example.com".to_string()),
            ..make_user("u1", Role::Customer)
        })
        .await
        .map_err(|e| e.to_string())?;
    if user.email.as_deref() != Some("u1@example.com") {
        return Err(format!("expected email to be filled, got {:?}", user.email));
    }
    Ok(())
}

async fn upsert_keeps_existing_email<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.upsert_user(NewUser {
        email: Some("first@example.com".to_string()),
        ..make_user("u1", Role::Customer)
    })
    .await
    .map_err(|e| e.to_string())?;
    let (user, _) = s
        .upsert_user(NewUser {
            email: Some("second@example.com".to_string()),
            ..make_user("u1", Role::Customer)
        })
        .await
        .map_err(|e| e.to_string())?;
    if user.email.as_deref() != Some("first@example.com") {
        return Err(format!("existing email was overwritten: {:?}", user.email));
    }
    Ok(())
}

async fn upsert_promotes_customer_to_provider<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    let (user, _) = s
        .upsert_user(make_user("u1", Role::Provider))
        .await
        .map_err(|e| e.to_string())?;
    if user.role != Role::Provider {
        return Err(format!("expected provider, got {}", user.role));
    }
    Ok(())
}

async fn upsert_never_demotes_provider<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.upsert_user(make_user("u1", Role::Provider))
        .await
        .map_err(|e| e.to_string())?;
    let (user, _) = s
        .upsert_user(make_user("u1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    if user.role != Role::Provider {
        return Err(format!("provider was demoted to {}", user.role));
    }
    Ok(())
}

async fn get_missing_user_returns_user_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_user("ghost").await {
        Err(StorageError::UserNotFound { user_id }) if user_id == "ghost" => Ok(()),
        other => Err(format!("expected UserNotFound, got {:?}", other)),
    }
}
