//! `careescrow serve`: HTTP JSON API over the booking lifecycle.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication (`CARE_API_KEY` or `[server] api_key`)
//! - Optional session tokens (`[auth.sessions]`) that fix the acting user
//!
//! Endpoints:
//! - GET  /health                  - Server status (exempt from auth)
//! - POST /bookings                - Create a booking and fund its escrow
//! - POST /bookings/release        - Customer releases escrow to the provider
//! - POST /bookings/cancel         - Customer cancels, refunding any stake
//! - POST /bookings/list           - Customer's bookings with services
//! - POST /provider/jobs           - Provider's bookings with customers
//! - POST /provider/jobs/complete  - Provider marks a confirmed job done
//! - POST /provider/jobs/update    - Provider sets a job status
//! - POST /services                - Register a provider service
//! - POST /users/role              - Look up a user's role
//!
//! All responses use Content-Type: application/json.

mod error;
mod handlers;
mod middleware;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use careescrow_booking::BookingLifecycle;
use careescrow_storage::MemoryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use self::handlers::{
    handle_cancel, handle_create_booking, handle_create_service, handle_health,
    handle_list_bookings, handle_mark_job_done, handle_not_found, handle_provider_jobs,
    handle_release, handle_update_job, handle_user_role,
};
use self::middleware::{auth_middleware, rate_limit_middleware, session_middleware};
use self::state::{AppState, RateLimiter};

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({"success": false, "error": message})),
    )
}

/// Everything `start_server` needs besides the lifecycle.
pub(crate) struct ServeOptions {
    pub port: u16,
    pub rate_limit: u64,
    pub api_key: Option<String>,
    pub sessions: HashMap<String, String>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

fn router(state: Arc<AppState>) -> Router {
    // CORS: permissive for local dev
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/bookings", post(handle_create_booking))
        .route("/bookings/release", post(handle_release))
        .route("/bookings/cancel", post(handle_cancel))
        .route("/bookings/list", post(handle_list_bookings))
        .route("/provider/jobs", post(handle_provider_jobs))
        .route("/provider/jobs/complete", post(handle_mark_job_done))
        .route("/provider/jobs/update", post(handle_update_job))
        .route("/services", post(handle_create_service))
        .route("/users/role", post(handle_user_role))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    lifecycle: BookingLifecycle<MemoryStore>,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.api_key.is_some() {
        info!("API key authentication enabled");
    }
    if options.sessions.is_empty() {
        warn!("no sessions configured: acting user ids are taken from request bodies unverified");
    } else {
        info!(sessions = options.sessions.len(), "session authentication enabled");
    }
    info!(
        rate_limit = options.rate_limit,
        chain = lifecycle.chain().gateway_id(),
        stake_wei = %lifecycle.policy().stake_wei,
        "starting server"
    );

    let state = Arc::new(AppState {
        lifecycle,
        rate_limiter: RateLimiter::new(options.rate_limit),
        api_key: options.api_key,
        sessions: options.sessions,
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", options.port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&options.tls_cert, &options.tls_key) {
        let config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        info!("listening on https://{}", addr);
        axum_server::bind_rustls(socket_addr, config)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }
    #[cfg(not(feature = "tls"))]
    if options.tls_cert.is_some() || options.tls_key.is_some() {
        return Err("TLS requested but careescrow was built without the `tls` feature".into());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
