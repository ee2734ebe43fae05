//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use careescrow_booking::BookingLifecycle;
use careescrow_storage::MemoryStore;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Returns `Err(retry_after_secs)` once `ip` exceeds its window budget.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        tracker.retain(|_, (_, start)| {
            now.saturating_duration_since(*start).as_secs() < RATE_LIMIT_WINDOW_SECS
        });

        // Expired windows are dropped, so a surviving entry is still current.
        let entry = tracker.entry(ip).or_insert((0, now));
        let elapsed = now.saturating_duration_since(entry.1).as_secs();

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

/// Who the request acts as, set by the session middleware.
///
/// `user_id` is `None` when sessions are not configured; handlers then fall
/// back to the identifier in the request body.
#[derive(Debug, Clone, Default)]
pub(crate) struct Caller {
    pub(crate) user_id: Option<String>,
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) lifecycle: BookingLifecycle<MemoryStore>,
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key. `None` = no key required.
    pub(crate) api_key: Option<String>,
    /// Session bearer token → user id. Empty = caller-asserted identity.
    pub(crate) sessions: HashMap<String, String>,
}
