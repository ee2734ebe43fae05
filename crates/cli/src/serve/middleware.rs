//! HTTP middleware: rate limiting, API key and session authentication.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::state::{AppState, Caller};

/// Paths reachable without an API key or session.
fn is_public(path: &str) -> bool {
    path == "/health"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
}

/// Rate limiting middleware. Checks per-IP request rate before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.rate_limiter.check(addr.ip()).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(ip = %addr.ip(), retry_after, "rate limit exceeded");
            let body = serde_json::json!({
                "success": false,
                "error": "rate limit exceeded",
                "code": "RATE_LIMITED",
                "retry_after": retry_after,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
    }
}

/// API key authentication middleware.
///
/// If an API key is configured, all requests except /health must carry it
/// in `X-API-Key: <key>` or `Authorization: Bearer <key>`. When sessions
/// are also configured the bearer slot holds the session token, so the key
/// goes in `X-API-Key`.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let expected_key = match &state.api_key {
        Some(k) => k,
        None => return next.run(request).await,
    };
    if is_public(request.uri().path()) {
        return next.run(request).await;
    }

    if let Some(key) = request.headers().get("x-api-key").and_then(|v| v.to_str().ok()) {
        if key == expected_key {
            return next.run(request).await;
        }
        return super::json_error(StatusCode::FORBIDDEN, "invalid API key").into_response();
    }

    if let Some(token) = bearer_token(request.headers()) {
        if token == expected_key {
            return next.run(request).await;
        }
        return super::json_error(StatusCode::FORBIDDEN, "invalid API key").into_response();
    }

    super::json_error(StatusCode::UNAUTHORIZED, "authentication required").into_response()
}

/// Session middleware: resolves the bearer token to a [`Caller`].
///
/// Without configured sessions every request gets an anonymous caller and
/// handlers trust the identifier in the body.
pub(crate) async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if state.sessions.is_empty() || is_public(request.uri().path()) {
        request.extensions_mut().insert(Caller::default());
        return next.run(request).await;
    }

    let user_id = match bearer_token(request.headers()) {
        Some(token) => match state.sessions.get(token) {
            Some(user_id) => user_id.clone(),
            None => {
                return super::json_error(StatusCode::UNAUTHORIZED, "unknown session")
                    .into_response()
            }
        },
        None => {
            return super::json_error(StatusCode::UNAUTHORIZED, "session required")
                .into_response()
        }
    };

    request.extensions_mut().insert(Caller {
        user_id: Some(user_id),
    });
    next.run(request).await
}
