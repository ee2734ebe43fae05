//! Escrow-backed booking lifecycle.
//!
//! [`BookingLifecycle`] coordinates the relational booking record held by a
//! [`BookingStore`](careescrow_storage::BookingStore) with the escrow held
//! by a [`ChainGateway`](careescrow_chain::ChainGateway). Every operation is
//! a two-phase, non-atomic unit of work: persist first, call the chain,
//! then persist the result. A status that depends on the chain
//! (`confirmed`, `completed`, and `cancelled` after a refund) is only ever
//! written after the corresponding transaction is confirmed.
//!
//! Status moves along:
//!
//! ```text
//! pending ──► confirmed ──► in_review ──► completed
//!    │            │
//!    └────────────┴──► cancelled
//! ```

mod error;
mod funding;
mod identity;
mod jobs;
pub mod lifecycle;
mod orchestrator;
mod policy;
pub mod schedule;

pub use careescrow_storage::BookingStatus;
pub use error::BookingError;
pub use identity::RegisterServiceRequest;
pub use jobs::{JobCustomer, JobService, JobStatusUpdate, ProviderJob};
pub use orchestrator::{
    BookingLifecycle, CancelOutcome, CreateBookingRequest, CreatedBooking, CustomerBooking,
    ReleaseOutcome,
};
pub use policy::{EscrowPolicy, DEFAULT_PAYOUT_ADDRESS, DEFAULT_STAKE_WEI};
