//! Provider-facing job management.
//!
//! These operations never touch the chain. A provider's claim that a job
//! is done only moves the booking to `in_review`; the customer's release
//! is what completes it.

use std::collections::HashMap;

use careescrow_storage::{BookingRecord, BookingStatus, BookingStore, ServiceRecord, StorageError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BookingError;
use crate::lifecycle::can_advance;
use crate::orchestrator::{ensure_can_advance, required, transition_err, BookingLifecycle};

/// Service columns shown on a provider's job list.
#[derive(Debug, Clone, Serialize)]
pub struct JobService {
    pub name: String,
    pub hourly_rate: Decimal,
}

/// Customer columns shown on a provider's job list.
#[derive(Debug, Clone, Serialize)]
pub struct JobCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A booking on one of the provider's services.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderJob {
    #[serde(flatten)]
    pub booking: BookingRecord,
    pub services: Option<JobService>,
    pub users: Option<JobCustomer>,
}

#[derive(Debug, Clone)]
pub struct JobStatusUpdate {
    pub booking: BookingRecord,
    /// Whether the write followed the lifecycle table.
    pub follows_lifecycle: bool,
}

impl<S: BookingStore> BookingLifecycle<S> {
    /// Move a `confirmed` booking to `in_review` on the provider's word.
    pub async fn mark_job_done(
        &self,
        booking_id: &str,
        provider_id: &str,
    ) -> Result<BookingRecord, BookingError> {
        let booking_id = required("bookingId", booking_id)?;
        let provider_id = required("providerId", provider_id)?;

        let booking = self.owned_booking(booking_id, provider_id).await?;
        ensure_can_advance(&booking, BookingStatus::InReview)?;

        let booking = self
            .store()
            .transition_booking(
                booking_id,
                BookingStatus::Confirmed,
                BookingStatus::InReview,
                None,
            )
            .await
            .map_err(|e| transition_err(e, BookingStatus::InReview))?;
        info!(booking_id, provider_id, "job marked done, awaiting customer review");
        Ok(booking)
    }

    /// Set a booking's status from the provider dashboard.
    ///
    /// Ownership is enforced; ordering is not. An out-of-order write is
    /// allowed, logged, and reported through `follows_lifecycle`.
    pub async fn update_job_status(
        &self,
        booking_id: &str,
        status: &str,
        provider_id: &str,
    ) -> Result<JobStatusUpdate, BookingError> {
        let booking_id = required("bookingId", booking_id)?;
        let provider_id = required("providerId", provider_id)?;
        let status: BookingStatus = required("status", status)?
            .parse()
            .map_err(BookingError::Validation)?;

        let current = self.owned_booking(booking_id, provider_id).await?;
        let follows_lifecycle = can_advance(current.status, status);
        if !follows_lifecycle {
            warn!(
                booking_id,
                provider_id,
                from = %current.status,
                to = %status,
                "job status set outside the booking lifecycle"
            );
        }

        let booking = self.store().set_booking_status(booking_id, status).await?;
        info!(booking_id, provider_id, status = %status, "job status updated");
        Ok(JobStatusUpdate {
            booking,
            follows_lifecycle,
        })
    }

    /// Bookings across every service the provider owns, newest first.
    pub async fn list_provider_jobs(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ProviderJob>, BookingError> {
        let provider_id = required("providerId", provider_id)?;

        let services = self.store().list_services_by_provider(provider_id).await?;
        if services.is_empty() {
            return Ok(Vec::new());
        }
        let service_ids: Vec<String> = services.iter().map(|s| s.id.clone()).collect();
        let by_id: HashMap<&str, &ServiceRecord> =
            services.iter().map(|s| (s.id.as_str(), s)).collect();

        let bookings = self.store().list_bookings_by_services(&service_ids).await?;
        let mut customers: HashMap<String, Option<JobCustomer>> = HashMap::new();
        let mut jobs = Vec::with_capacity(bookings.len());
        for booking in bookings {
            if !customers.contains_key(&booking.user_id) {
                let customer = match self.store().get_user(&booking.user_id).await {
                    Ok(user) => Some(JobCustomer {
                        name: user.name,
                        email: user.email,
                        phone: user.phone,
                    }),
                    Err(StorageError::UserNotFound { .. }) => None,
                    Err(e) => return Err(e.into()),
                };
                customers.insert(booking.user_id.clone(), customer);
            }
            let services = by_id.get(booking.service_id.as_str()).map(|s| JobService {
                name: s.name.clone(),
                hourly_rate: s.hourly_rate,
            });
            let users = customers.get(&booking.user_id).cloned().flatten();
            jobs.push(ProviderJob {
                booking,
                services,
                users,
            });
        }
        Ok(jobs)
    }

    /// Load a booking and check that `provider_id` owns its service.
    async fn owned_booking(
        &self,
        booking_id: &str,
        provider_id: &str,
    ) -> Result<BookingRecord, BookingError> {
        let booking = self.store().get_booking(booking_id).await?;
        let service = self.store().get_service(&booking.service_id).await?;
        if service.provider_id.as_deref() != Some(provider_id) {
            warn!(booking_id, provider_id, "provider does not own the booking's service");
            return Err(BookingError::Unauthorized(
                "provider does not own this booking's service".to_string(),
            ));
        }
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use careescrow_chain::SimulatedChain;
    use careescrow_storage::{MemoryStore, NewService, NewUser, Role, ServiceType};

    use super::*;
    use crate::orchestrator::CreateBookingRequest;
    use crate::policy::EscrowPolicy;

    async fn confirmed_booking() -> (BookingLifecycle<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(NewUser {
                id: "provider-1".to_string(),
                email: None,
                name: None,
                role: Role::Provider,
            })
            .await
            .unwrap();
        let service = store
            .insert_service(NewService {
                provider_id: "provider-1".to_string(),
                service_type: ServiceType::Driver,
                name: "Clinic runs".to_string(),
                description: None,
                hourly_rate: Decimal::new(1800, 2),
                availability: None,
                image_url: None,
            })
            .await
            .unwrap();
        let lifecycle = BookingLifecycle::new(
            store,
            Arc::new(SimulatedChain::new()),
            EscrowPolicy::default(),
        );
        let created = lifecycle
            .create_booking(CreateBookingRequest {
                customer_id: "customer-1".to_string(),
                email: Some("c@example.com".to_string()),
                service_id: service.id,
                date: "2025-06-01".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (lifecycle, created.booking.id)
    }

    #[tokio::test]
    async fn owner_marks_confirmed_job_done() {
        let (lifecycle, id) = confirmed_booking().await;
        let booking = lifecycle.mark_job_done(&id, "provider-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::InReview);
    }

    #[tokio::test]
    async fn mark_done_twice_is_an_invalid_transition() {
        let (lifecycle, id) = confirmed_booking().await;
        lifecycle.mark_job_done(&id, "provider-1").await.unwrap();
        let err = lifecycle.mark_job_done(&id, "provider-1").await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::InReview,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_status_is_a_validation_error() {
        let (lifecycle, id) = confirmed_booking().await;
        let err = lifecycle
            .update_job_status(&id, "done", "provider-1")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn out_of_order_update_is_flagged() {
        let (lifecycle, id) = confirmed_booking().await;

        let update = lifecycle
            .update_job_status(&id, "in_review", "provider-1")
            .await
            .unwrap();
        assert!(update.follows_lifecycle);

        let update = lifecycle
            .update_job_status(&id, "pending", "provider-1")
            .await
            .unwrap();
        assert!(!update.follows_lifecycle);
        assert_eq!(update.booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn stranger_cannot_update_status() {
        let (lifecycle, id) = confirmed_booking().await;
        let err = lifecycle
            .update_job_status(&id, "in_review", "provider-2")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn provider_jobs_join_service_and_customer() {
        let (lifecycle, id) = confirmed_booking().await;
        let jobs = lifecycle.list_provider_jobs("provider-1").await.unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].booking.id, id);
        let json = serde_json::to_value(&jobs[0]).unwrap();
        assert_eq!(json["services"]["name"], "Clinic runs");
        assert_eq!(json["services"]["hourly_rate"], "18.00");
        assert_eq!(json["users"]["email"], "c@example.com");
        assert_eq!(json["status"], "confirmed");
    }

    #[tokio::test]
    async fn provider_without_services_has_no_jobs() {
        let (lifecycle, _) = confirmed_booking().await;
        assert!(lifecycle
            .list_provider_jobs("customer-1")
            .await
            .unwrap()
            .is_empty());
    }
}
