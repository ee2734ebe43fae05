//! Booking lifecycle orchestrator.
//!
//! Each operation follows the same two-phase shape:
//! 1. Read or insert the booking row and check the transition is legal
//! 2. Submit the escrow transaction and wait for its confirmation
//! 3. Compare-and-set the booking to its next status with the tx hash
//!
//! A chain failure in step 2 returns before step 3, so the row keeps its
//! last confirmed status. Nothing is retried.

use std::collections::HashMap;
use std::sync::Arc;

use careescrow_chain::{ChainGateway, EscrowKey, TxReceipt, TxStatus};
use careescrow_storage::{
    BookingRecord, BookingStatus, BookingStore, NewBooking, NewUser, Role, ServiceRecord,
    StorageError, UserRecord,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::BookingError;
use crate::funding::{pending_notes, FundingState};
use crate::lifecycle::{can_advance, is_terminal, successors};
use crate::policy::EscrowPolicy;
use crate::schedule::{format_schedule, parse_schedule};

/// Input of [`BookingLifecycle::create_booking`].
#[derive(Debug, Clone, Default)]
pub struct CreateBookingRequest {
    pub customer_id: String,
    pub email: Option<String>,
    pub service_id: String,
    /// RFC 3339 timestamp, or `YYYY-MM-DD` combined with `time`.
    pub date: String,
    /// `HH:MM`, UTC.
    pub time: Option<String>,
    /// Defaults to one hour.
    pub duration_hours: Option<u32>,
    pub notes: Option<String>,
    /// Price the client displayed. Logged, never charged.
    pub quoted_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: BookingRecord,
    pub escrow_key: EscrowKey,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub booking: BookingRecord,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub booking: BookingRecord,
    /// `None` when nothing was escrowed and no refund was mined.
    pub receipt: Option<TxReceipt>,
}

/// A customer's booking joined with its service.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerBooking {
    #[serde(flatten)]
    pub booking: BookingRecord,
    pub services: Option<ServiceRecord>,
}

/// Coordinates a [`BookingStore`] and a [`ChainGateway`].
///
/// Constructed once per process. The chain gateway is shared, so every
/// transaction goes out through the same relayer account.
pub struct BookingLifecycle<S: BookingStore> {
    store: Arc<S>,
    chain: Arc<dyn ChainGateway>,
    policy: EscrowPolicy,
}

impl<S: BookingStore> BookingLifecycle<S> {
    pub fn new(store: Arc<S>, chain: Arc<dyn ChainGateway>, policy: EscrowPolicy) -> Self {
        Self {
            store,
            chain,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn chain(&self) -> &dyn ChainGateway {
        self.chain.as_ref()
    }

    pub fn policy(&self) -> &EscrowPolicy {
        &self.policy
    }

    /// Create a booking and fund its escrow.
    ///
    /// The booking row is inserted as `pending` before the chain is
    /// touched. It becomes `confirmed` only once the `createBooking`
    /// transaction is mined; on any chain failure it stays `pending` and
    /// `EscrowFundingFailed` is returned.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<CreatedBooking, BookingError> {
        let customer_id = required("userId", &request.customer_id)?;
        let service_id = required("serviceId", &request.service_id)?;
        let scheduled_at = format_schedule(parse_schedule(&request.date, request.time.as_deref())?)?;
        let duration_hours = match request.duration_hours {
            None => 1,
            Some(0) => {
                return Err(BookingError::Validation(
                    "duration must be a positive number of hours".to_string(),
                ))
            }
            Some(hours) => hours,
        };
        let customer_notes = request.notes.filter(|n| !n.trim().is_empty());

        let service = self.store.get_service(service_id).await?;

        self.provision(NewUser {
            id: customer_id.to_string(),
            email: request.email,
            name: None,
            role: Role::Customer,
        })
        .await?;

        let booking = self
            .store
            .insert_booking(NewBooking {
                user_id: customer_id.to_string(),
                service_id: service.id.clone(),
                scheduled_at,
                duration_hours,
                notes: Some(pending_notes(
                    customer_notes.as_deref(),
                    &FundingState::InFlight,
                )),
            })
            .await?;

        let escrow_key = EscrowKey::derive(&booking.id);
        let payout = self.policy.payout_for(service.provider_id.as_deref());
        info!(
            booking_id = %booking.id,
            customer_id,
            service_id = %service.id,
            escrow_key = %escrow_key,
            payout = %payout,
            stake_wei = %self.policy.stake_wei,
            quoted_price = ?request.quoted_price,
            "booking pending, funding escrow"
        );

        let receipt = match self
            .chain
            .create_escrow(&escrow_key, &payout, self.policy.stake_wei)
            .await
        {
            Ok(receipt) => receipt,
            Err(source) => {
                error!(
                    booking_id = %booking.id,
                    tx_hash = source.tx_hash().unwrap_or("-"),
                    error = %source,
                    "escrow funding failed, booking left pending"
                );
                let funding = FundingState::after_failure(&source);
                if funding != FundingState::InFlight {
                    self.record_funding(&booking.id, customer_notes.as_deref(), &funding)
                        .await;
                }
                return Err(BookingError::EscrowFundingFailed {
                    booking_id: booking.id,
                    source,
                });
            }
        };

        let notes = match customer_notes {
            Some(notes) => format!("{}\n{}", notes, funded_note(&receipt.tx_hash)),
            None => funded_note(&receipt.tx_hash),
        };
        let booking = self
            .record_confirmed(
                &booking.id,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                notes,
                &receipt,
            )
            .await?;

        Ok(CreatedBooking {
            booking,
            escrow_key,
            receipt,
        })
    }

    /// Release a booking's escrow to the provider.
    ///
    /// Only the booking's customer may release, and only from `in_review`.
    /// The booking becomes `completed` once `releaseFunds` is mined.
    pub async fn release_escrow(
        &self,
        booking_id: &str,
        requester_id: &str,
    ) -> Result<ReleaseOutcome, BookingError> {
        let booking_id = required("bookingId", booking_id)?;
        let requester_id = required("userId", requester_id)?;

        let booking = self.store.get_booking(booking_id).await?;
        if booking.user_id != requester_id {
            warn!(booking_id, requester_id, "release rejected: not the booking's customer");
            return Err(BookingError::Unauthorized(
                "only the booking's customer can release its escrow".to_string(),
            ));
        }
        ensure_can_advance(&booking, BookingStatus::Completed)?;

        let escrow_key = EscrowKey::derive(&booking.id);
        info!(booking_id, escrow_key = %escrow_key, "releasing escrow");
        let receipt = match self.chain.release_escrow(&escrow_key).await {
            Ok(receipt) => receipt,
            Err(source) => {
                error!(
                    booking_id,
                    tx_hash = source.tx_hash().unwrap_or("-"),
                    error = %source,
                    "escrow release failed, booking left in_review"
                );
                return Err(BookingError::EscrowReleaseFailed {
                    booking_id: booking.id,
                    source,
                });
            }
        };

        let booking = self
            .record_confirmed(
                &booking.id,
                BookingStatus::InReview,
                BookingStatus::Completed,
                released_note(&receipt.tx_hash),
                &receipt,
            )
            .await?;
        Ok(ReleaseOutcome { booking, receipt })
    }

    /// Cancel a `pending` or `confirmed` booking, refunding its stake.
    ///
    /// A `confirmed` booking is cancelled once its `refund` is mined. For a
    /// `pending` booking the funding transaction is resolved first: if it
    /// never landed the booking is cancelled without a transaction, if it
    /// landed the stake is refunded, and while it may still be mined the
    /// booking stays `pending` and `FundingUnresolved` is returned.
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        requester_id: &str,
    ) -> Result<CancelOutcome, BookingError> {
        let booking_id = required("bookingId", booking_id)?;
        let requester_id = required("userId", requester_id)?;

        let booking = self.store.get_booking(booking_id).await?;
        if booking.user_id != requester_id {
            warn!(booking_id, requester_id, "cancel rejected: not the booking's customer");
            return Err(BookingError::Unauthorized(
                "only the booking's customer can cancel it".to_string(),
            ));
        }
        ensure_can_advance(&booking, BookingStatus::Cancelled)?;

        let funding_known = match booking.status {
            BookingStatus::Pending => match self.pending_funding(&booking).await? {
                PendingFunding::Absent => return self.cancel_unfunded(booking).await,
                PendingFunding::Landed => true,
                PendingFunding::Unknown => false,
            },
            _ => true,
        };

        let escrow_key = EscrowKey::derive(&booking.id);
        match self.chain.refund_escrow(&escrow_key).await {
            Ok(receipt) => {
                let booking = self
                    .record_confirmed(
                        &booking.id,
                        booking.status,
                        BookingStatus::Cancelled,
                        refunded_note(&receipt.tx_hash),
                        &receipt,
                    )
                    .await?;
                Ok(CancelOutcome {
                    booking,
                    receipt: Some(receipt),
                })
            }
            Err(source) if !funding_known && source.is_revert() => {
                warn!(
                    booking_id,
                    error = %source,
                    "nothing escrowed yet and funding outcome unknown, booking left pending"
                );
                Err(BookingError::FundingUnresolved {
                    booking_id: booking.id,
                    tx_hash: None,
                })
            }
            Err(source) => {
                error!(
                    booking_id,
                    status = %booking.status,
                    tx_hash = source.tx_hash().unwrap_or("-"),
                    error = %source,
                    "escrow refund failed, booking not cancelled"
                );
                Err(BookingError::EscrowRefundFailed {
                    booking_id: booking.id,
                    source,
                })
            }
        }
    }

    /// Where the funding of a `pending` booking stands on chain.
    async fn pending_funding(
        &self,
        booking: &BookingRecord,
    ) -> Result<PendingFunding, BookingError> {
        let tx_hash = match FundingState::from_notes(booking.notes.as_deref()) {
            FundingState::NotFunded => return Ok(PendingFunding::Absent),
            FundingState::InFlight => return Ok(PendingFunding::Unknown),
            FundingState::Submitted(tx_hash) => tx_hash,
        };

        let status = self
            .chain
            .transaction_status(&tx_hash)
            .await
            .map_err(|source| BookingError::EscrowRefundFailed {
                booking_id: booking.id.clone(),
                source,
            })?;
        info!(
            booking_id = %booking.id,
            tx_hash = %tx_hash,
            status = ?status,
            "resolved funding transaction"
        );
        match status {
            TxStatus::Unknown | TxStatus::Reverted => Ok(PendingFunding::Absent),
            TxStatus::Mined { .. } => Ok(PendingFunding::Landed),
            TxStatus::Pending => {
                warn!(
                    booking_id = %booking.id,
                    tx_hash = %tx_hash,
                    "funding transaction still pending, booking left pending"
                );
                Err(BookingError::FundingUnresolved {
                    booking_id: booking.id.clone(),
                    tx_hash: Some(tx_hash),
                })
            }
        }
    }

    /// Cancel a `pending` booking whose funding never reached the contract.
    async fn cancel_unfunded(
        &self,
        booking: BookingRecord,
    ) -> Result<CancelOutcome, BookingError> {
        info!(booking_id = %booking.id, "nothing escrowed, cancelling pending booking");
        let booking = self
            .store
            .transition_booking(
                &booking.id,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
                None,
            )
            .await
            .map_err(|e| transition_err(e, BookingStatus::Cancelled))?;
        Ok(CancelOutcome {
            booking,
            receipt: None,
        })
    }

    /// A customer's bookings, soonest first, each joined with its service.
    pub async fn list_customer_bookings(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CustomerBooking>, BookingError> {
        let customer_id = required("userId", customer_id)?;
        let bookings = self.store.list_bookings_by_user(customer_id).await?;

        let mut services: HashMap<String, Option<ServiceRecord>> = HashMap::new();
        let mut joined = Vec::with_capacity(bookings.len());
        for booking in bookings {
            if !services.contains_key(&booking.service_id) {
                let service = match self.store.get_service(&booking.service_id).await {
                    Ok(service) => Some(service),
                    Err(StorageError::ServiceNotFound { .. }) => None,
                    Err(e) => return Err(e.into()),
                };
                services.insert(booking.service_id.clone(), service);
            }
            let service = services.get(&booking.service_id).cloned().flatten();
            joined.push(CustomerBooking {
                booking,
                services: service,
            });
        }
        Ok(joined)
    }

    /// Persist the status that a mined transaction entitles the booking to.
    async fn record_confirmed(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        new_status: BookingStatus,
        notes: String,
        receipt: &TxReceipt,
    ) -> Result<BookingRecord, BookingError> {
        match self
            .store
            .transition_booking(booking_id, expected, new_status, Some(notes))
            .await
        {
            Ok(booking) => {
                info!(
                    booking_id,
                    status = %new_status,
                    tx_hash = %receipt.tx_hash,
                    block_number = receipt.block_number,
                    "escrow transaction confirmed, booking updated"
                );
                Ok(booking)
            }
            Err(e) => {
                error!(
                    booking_id,
                    status = %new_status,
                    tx_hash = %receipt.tx_hash,
                    error = %e,
                    "transaction confirmed but booking was not updated; reconcile manually"
                );
                Err(BookingError::ConfirmationNotRecorded {
                    booking_id: booking_id.to_string(),
                    tx_hash: receipt.tx_hash.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Note on a still-`pending` booking what its failed funding call left
    /// behind. A failed write leaves the outcome unknown.
    async fn record_funding(
        &self,
        booking_id: &str,
        customer_notes: Option<&str>,
        funding: &FundingState,
    ) {
        let notes = pending_notes(customer_notes, funding);
        if let Err(e) = self
            .store
            .transition_booking(
                booking_id,
                BookingStatus::Pending,
                BookingStatus::Pending,
                Some(notes),
            )
            .await
        {
            warn!(booking_id, error = %e, "could not record funding outcome");
        }
    }

    /// Upsert a user row, mapping any failure to `IdentityProvisioningFailed`.
    pub(crate) async fn provision(
        &self,
        user: NewUser,
    ) -> Result<UserRecord, BookingError> {
        let user_id = user.id.clone();
        let role = user.role;
        match self.store.upsert_user(user).await {
            Ok((record, created)) => {
                if created {
                    info!(user_id = %record.id, role = %role, "user provisioned");
                }
                Ok(record)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "user provisioning failed");
                Err(BookingError::IdentityProvisioningFailed {
                    user_id,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Funding of a `pending` booking as seen before cancelling it.
enum PendingFunding {
    /// The contract never received the stake.
    Absent,
    /// The funding transaction was mined.
    Landed,
    /// No transaction on record; a refund attempt decides.
    Unknown,
}

pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, BookingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BookingError::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

pub(crate) fn ensure_can_advance(
    booking: &BookingRecord,
    to: BookingStatus,
) -> Result<(), BookingError> {
    if can_advance(booking.status, to) {
        return Ok(());
    }
    warn!(
        booking_id = %booking.id,
        from = %booking.status,
        to = %to,
        terminal = is_terminal(booking.status),
        allowed = ?successors(booking.status),
        "rejected out-of-order transition"
    );
    Err(BookingError::InvalidTransition {
        booking_id: booking.id.clone(),
        from: booking.status,
        to,
    })
}

/// A lost compare-and-set means another request moved the booking first.
pub(crate) fn transition_err(e: StorageError, to: BookingStatus) -> BookingError {
    match e {
        StorageError::StatusConflict {
            booking_id, found, ..
        } => BookingError::InvalidTransition {
            booking_id,
            from: found,
            to,
        },
        other => other.into(),
    }
}

fn funded_note(tx_hash: &str) -> String {
    format!("Tx Hash: {}", tx_hash)
}

fn released_note(tx_hash: &str) -> String {
    format!("Funds Released. Tx: {}", tx_hash)
}

fn refunded_note(tx_hash: &str) -> String {
    format!("Refunded. Tx: {}", tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use careescrow_chain::{ChainError, SimulatedChain};
    use careescrow_storage::{MemoryStore, NewService, ServiceType};

    use crate::policy::DEFAULT_STAKE_WEI;

    struct Fixture {
        store: Arc<MemoryStore>,
        chain: Arc<SimulatedChain>,
        lifecycle: BookingLifecycle<MemoryStore>,
        service_id: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let chain = Arc::new(SimulatedChain::new());
        store
            .upsert_user(NewUser {
                id: "provider-1".to_string(),
                email: None,
                name: Some("Pat".to_string()),
                role: Role::Provider,
            })
            .await
            .unwrap();
        let service = store
            .insert_service(NewService {
                provider_id: "provider-1".to_string(),
                service_type: ServiceType::Nurse,
                name: "Night nurse".to_string(),
                description: None,
                hourly_rate: Decimal::new(3000, 2),
                availability: None,
                image_url: None,
            })
            .await
            .unwrap();
        let lifecycle =
            BookingLifecycle::new(store.clone(), chain.clone(), EscrowPolicy::default());
        Fixture {
            store,
            chain,
            lifecycle,
            service_id: service.id,
        }
    }

    fn request(service_id: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            customer_id: "customer-1".to_string(),
            email: Some("c@example.com".to_string()),
            service_id: service_id.to_string(),
            date: "2025-06-01".to_string(),
            time: Some("10:00".to_string()),
            duration_hours: Some(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_confirms_with_tx_hash_in_notes() {
        let f = fixture().await;
        let created = f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();

        assert_eq!(created.booking.status, BookingStatus::Confirmed);
        assert_eq!(created.booking.scheduled_at, "2025-06-01T10:00:00Z");
        assert_eq!(created.booking.duration_hours, 2);
        assert_eq!(
            created.booking.notes.as_deref(),
            Some(format!("Tx Hash: {}", created.receipt.tx_hash).as_str())
        );
        assert_eq!(created.escrow_key, EscrowKey::derive(&created.booking.id));
        let escrow = f.chain.escrow(&created.escrow_key).await.unwrap();
        assert_eq!(escrow.amount_wei, DEFAULT_STAKE_WEI);
        assert_eq!(escrow.provider, f.lifecycle.policy().default_payout_address);
    }

    #[tokio::test]
    async fn customer_notes_are_kept_ahead_of_tx_hash() {
        let f = fixture().await;
        let mut req = request(&f.service_id);
        req.notes = Some("Ring twice".to_string());
        let created = f.lifecycle.create_booking(req).await.unwrap();

        let notes = created.booking.notes.unwrap();
        assert!(notes.starts_with("Ring twice\n"));
        assert!(notes.ends_with(&created.receipt.tx_hash));
    }

    #[tokio::test]
    async fn duration_defaults_to_one_hour() {
        let f = fixture().await;
        let mut req = request(&f.service_id);
        req.duration_hours = None;
        let created = f.lifecycle.create_booking(req).await.unwrap();
        assert_eq!(created.booking.duration_hours, 1);
    }

    #[tokio::test]
    async fn zero_duration_is_rejected_before_any_write() {
        let f = fixture().await;
        let mut req = request(&f.service_id);
        req.duration_hours = Some(0);

        let err = f.lifecycle.create_booking(req).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert_eq!(f.store.booking_count().await, 0);
        assert!(f.chain.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_service_provisions_nothing() {
        let f = fixture().await;
        let err = f
            .lifecycle
            .create_booking(request("no-such-service"))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::NotFound { entity: "service", .. }));
        assert_eq!(f.store.user_count().await, 1);
        assert_eq!(f.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn registered_wallet_receives_the_escrow() {
        let f = fixture().await;
        let wallet = "0x2222222222222222222222222222222222222222".parse().unwrap();
        let mut policy = EscrowPolicy::default();
        policy.payout_addresses.insert("provider-1".to_string(), wallet);
        let lifecycle = BookingLifecycle::new(f.store.clone(), f.chain.clone(), policy);

        let created = lifecycle.create_booking(request(&f.service_id)).await.unwrap();
        assert_eq!(f.chain.escrow(&created.escrow_key).await.unwrap().provider, wallet);
    }

    #[tokio::test]
    async fn release_from_confirmed_is_rejected_without_chain_call() {
        let f = fixture().await;
        let created = f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();
        let calls_before = f.chain.calls().await.len();

        let err = f
            .lifecycle
            .release_escrow(&created.booking.id, "customer-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Completed,
                ..
            }
        ));
        assert_eq!(f.chain.calls().await.len(), calls_before);
    }

    #[tokio::test]
    async fn release_by_stranger_is_unauthorized() {
        let f = fixture().await;
        let created = f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();
        let err = f
            .lifecycle
            .release_escrow(&created.booking.id, "someone-else")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn missing_ids_are_validation_errors() {
        let f = fixture().await;
        assert!(matches!(
            f.lifecycle.release_escrow("", "customer-1").await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            f.lifecycle.cancel_booking("b1", "  ").await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            f.lifecycle.list_customer_bookings("").await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancel_confirmed_refunds_the_stake() {
        let f = fixture().await;
        let created = f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();

        let outcome = f
            .lifecycle
            .cancel_booking(&created.booking.id, "customer-1")
            .await
            .unwrap();
        let receipt = outcome.receipt.unwrap();
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
        assert_eq!(
            outcome.booking.notes.as_deref(),
            Some(format!("Refunded. Tx: {}", receipt.tx_hash).as_str())
        );
        assert!(f.chain.escrow(&created.escrow_key).await.unwrap().refunded);
    }

    async fn failed_booking_id(f: &Fixture, error: ChainError) -> String {
        f.chain.fail_next(error).await;
        match f.lifecycle.create_booking(request(&f.service_id)).await {
            Err(BookingError::EscrowFundingFailed { booking_id, .. }) => booking_id,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_pending_without_escrow_needs_no_transaction() {
        let f = fixture().await;
        let booking_id = failed_booking_id(
            &f,
            ChainError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            },
        )
        .await;
        let stored = f.store.get_booking(&booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.notes.as_deref(), Some("Funding Failed."));

        let outcome = f.lifecycle.cancel_booking(&booking_id, "customer-1").await.unwrap();
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
        assert!(outcome.receipt.is_none());
        assert!(f.chain.calls().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_with_unknown_funding_outcome_keeps_booking_pending() {
        let f = fixture().await;
        let booking_id =
            failed_booking_id(&f, ChainError::Transport("connection reset".to_string())).await;

        let err = f
            .lifecycle
            .cancel_booking(&booking_id, "customer-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::FundingUnresolved { tx_hash: None, .. }
        ));
        let stored = f.store.get_booking(&booking_id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn customer_notes_survive_a_failed_funding() {
        let f = fixture().await;
        f.chain
            .fail_next(ChainError::Reverted {
                tx_hash: "0xdead".to_string(),
            })
            .await;
        let mut req = request(&f.service_id);
        req.notes = Some("Gate code 42".to_string());
        let booking_id = match f.lifecycle.create_booking(req).await {
            Err(BookingError::EscrowFundingFailed { booking_id, .. }) => booking_id,
            other => panic!("unexpected result: {other:?}"),
        };

        let stored = f.store.get_booking(&booking_id).await.unwrap();
        assert_eq!(stored.notes.as_deref(), Some("Gate code 42\nFunding Failed."));
    }

    #[tokio::test]
    async fn failed_refund_keeps_booking_confirmed() {
        let f = fixture().await;
        let created = f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();
        f.chain
            .fail_next(ChainError::Timeout {
                tx_hash: Some("0xfeed".to_string()),
                waited_secs: 120,
            })
            .await;

        let err = f
            .lifecycle
            .cancel_booking(&created.booking.id, "customer-1")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::EscrowRefundFailed { .. }));
        assert_eq!(err.tx_hash(), Some("0xfeed"));
        let stored = f.store.get_booking(&created.booking.id).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn customer_bookings_are_joined_with_services() {
        let f = fixture().await;
        let mut later = request(&f.service_id);
        later.date = "2025-07-01".to_string();
        f.lifecycle.create_booking(later).await.unwrap();
        f.lifecycle.create_booking(request(&f.service_id)).await.unwrap();

        let bookings = f.lifecycle.list_customer_bookings("customer-1").await.unwrap();
        assert_eq!(bookings.len(), 2);
        assert_eq!(bookings[0].booking.scheduled_at, "2025-06-01T10:00:00Z");
        assert_eq!(
            bookings[0].services.as_ref().map(|s| s.name.as_str()),
            Some("Night nurse")
        );

        let json = serde_json::to_value(&bookings[0]).unwrap();
        assert_eq!(json["status"], "confirmed");
        assert_eq!(json["services"]["name"], "Night nurse");
    }
}
