pub mod conformance;
mod error;
pub mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{
    BookingRecord, BookingStatus, NewBooking, NewService, NewUser, Role, ServiceRecord,
    ServiceType, UserRecord,
};
pub use traits::BookingStore;
