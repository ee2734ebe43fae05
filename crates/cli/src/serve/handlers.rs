//! HTTP route handlers: bookings, provider jobs, services, roles.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use careescrow_booking::{BookingError, CreateBookingRequest, RegisterServiceRequest};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::json_error;
use super::state::{AppState, Caller};

type ApiResult = Result<Json<Value>, ApiError>;

/// Resolve the user a request acts as.
///
/// With a session the session user wins and a conflicting body id is
/// refused. Without one the body id is trusted.
fn acting_user(caller: &Caller, claimed: Option<String>, field: &str) -> Result<String, ApiError> {
    let claimed = claimed.filter(|c| !c.trim().is_empty());
    match (&caller.user_id, claimed) {
        (Some(principal), Some(claimed)) if *principal != claimed => Err(ApiError::Forbidden(
            format!("{} does not match the session user", field),
        )),
        (Some(principal), _) => Ok(principal.clone()),
        (None, Some(claimed)) => Ok(claimed),
        (None, None) => Err(BookingError::Validation(format!("{} is required", field)).into()),
    }
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "chain": state.lifecycle.chain().gateway_id(),
    });
    (StatusCode::OK, Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CreateBookingBody {
    service_id: String,
    user_id: Option<String>,
    email: Option<String>,
    date: String,
    time: Option<String>,
    duration: Option<u32>,
    notes: Option<String>,
    price: Option<Decimal>,
}

/// POST /bookings
pub(crate) async fn handle_create_booking(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CreateBookingBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let customer_id = acting_user(&caller, body.user_id, "userId")?;

    let created = state
        .lifecycle
        .create_booking(CreateBookingRequest {
            customer_id,
            email: body.email,
            service_id: body.service_id,
            date: body.date,
            time: body.time,
            duration_hours: body.duration,
            notes: body.notes,
            quoted_price: body.price,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": created.booking,
        "txHash": created.receipt.tx_hash,
        "escrowKey": created.escrow_key.to_hex(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct BookingActionBody {
    booking_id: String,
    user_id: Option<String>,
}

/// POST /bookings/release
pub(crate) async fn handle_release(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<BookingActionBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let requester_id = acting_user(&caller, body.user_id, "userId")?;

    let outcome = state
        .lifecycle
        .release_escrow(&body.booking_id, &requester_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "txHash": outcome.receipt.tx_hash,
        "booking": outcome.booking,
    })))
}

/// POST /bookings/cancel
pub(crate) async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<BookingActionBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let requester_id = acting_user(&caller, body.user_id, "userId")?;

    let outcome = state
        .lifecycle
        .cancel_booking(&body.booking_id, &requester_id)
        .await?;

    let mut response = json!({
        "success": true,
        "status": outcome.booking.status,
    });
    if let Some(receipt) = outcome.receipt {
        response["txHash"] = Value::String(receipt.tx_hash);
    }
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct UserBody {
    user_id: Option<String>,
}

/// POST /bookings/list
pub(crate) async fn handle_list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let customer_id = acting_user(&caller, body.user_id, "userId")?;
    let bookings = state.lifecycle.list_customer_bookings(&customer_id).await?;
    Ok(Json(json!({ "success": true, "data": bookings })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ProviderBody {
    provider_id: Option<String>,
}

/// POST /provider/jobs
pub(crate) async fn handle_provider_jobs(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ProviderBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let provider_id = acting_user(&caller, body.provider_id, "providerId")?;
    let jobs = state.lifecycle.list_provider_jobs(&provider_id).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct JobBody {
    booking_id: String,
    provider_id: Option<String>,
    status: String,
}

/// POST /provider/jobs/complete
pub(crate) async fn handle_mark_job_done(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<JobBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let provider_id = acting_user(&caller, body.provider_id, "providerId")?;
    let booking = state
        .lifecycle
        .mark_job_done(&body.booking_id, &provider_id)
        .await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

/// POST /provider/jobs/update
pub(crate) async fn handle_update_job(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<JobBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let provider_id = acting_user(&caller, body.provider_id, "providerId")?;
    let update = state
        .lifecycle
        .update_job_status(&body.booking_id, &body.status, &provider_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "booking": update.booking,
        "followsLifecycle": update.follows_lifecycle,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServiceBody {
    provider_id: Option<String>,
    email: Option<String>,
    name: String,
    #[serde(rename = "type")]
    service_type: String,
    hourly_rate: Decimal,
    description: Option<String>,
    image_url: Option<String>,
    availability: Option<Value>,
}

/// POST /services
pub(crate) async fn handle_create_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ServiceBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let provider_id = acting_user(&caller, body.provider_id, "provider_id")?;
    let service = state
        .lifecycle
        .register_service(RegisterServiceRequest {
            provider_id,
            email: body.email,
            name: body.name,
            service_type: body.service_type,
            hourly_rate: body.hourly_rate,
            description: body.description,
            image_url: body.image_url,
            availability: body.availability,
        })
        .await?;
    Ok(Json(json!({ "success": true, "service": service })))
}

/// POST /users/role
pub(crate) async fn handle_user_role(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let user_id = acting_user(&caller, body.user_id, "userId")?;
    let role = state.lifecycle.resolve_role(&user_id).await?;
    Ok(Json(json!({ "role": role })))
}
