//! Conformance test suite for `BookingStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `BookingStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Users**: idempotent upsert, field merging, provider promotion
//! - **Services**: provider foreign key, per-provider listing
//! - **Bookings**: pending on insert, foreign keys, list ordering
//! - **Status writes**: compare-and-set conflicts, unconditional set
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use careescrow_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod bookings;
mod services;
mod status;
mod users;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;

use crate::record::{NewBooking, NewService, NewUser, Role, ServiceRecord, ServiceType};
use crate::BookingStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "users", "bookings", "status").
    pub category: String,
    /// Test name (e.g. "upsert_is_idempotent_on_id").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: BookingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(users::run_user_tests(&factory).await);
    results.extend(services::run_service_tests(&factory).await);
    results.extend(bookings::run_booking_tests(&factory).await);
    results.extend(status::run_status_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: row constructors with sensible defaults ─────────────────────────

fn make_user(id: &str, role: Role) -> NewUser {
    NewUser {
        id: id.to_string(),
        email: None,
        name: None,
        role,
    }
}

fn make_service(provider_id: &str, name: &str) -> NewService {
    NewService {
        provider_id: provider_id.to_string(),
        service_type: ServiceType::Nurse,
        name: name.to_string(),
        description: None,
        hourly_rate: Decimal::new(2500, 2),
        availability: None,
        image_url: None,
    }
}

fn make_booking(user_id: &str, service_id: &str, scheduled_at: &str) -> NewBooking {
    NewBooking {
        user_id: user_id.to_string(),
        service_id: service_id.to_string(),
        scheduled_at: scheduled_at.to_string(),
        duration_hours: 2,
        notes: None,
    }
}

/// Seed a provider, one of their services, and a customer.
async fn seed<S: BookingStore>(s: &S) -> Result<ServiceRecord, String> {
    s.upsert_user(make_user("provider-1", Role::Provider))
        .await
        .map_err(|e| e.to_string())?;
    s.upsert_user(make_user("customer-1", Role::Customer))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_service(make_service("provider-1", "Night nurse"))
        .await
        .map_err(|e| e.to_string())
}
