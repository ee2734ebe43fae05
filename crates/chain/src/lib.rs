//! Chain gateway for the on-chain booking escrow.
//!
//! The escrow contract is a fixed external collaborator with this ABI:
//!
//! ```text
//! function createBooking(uint256 bookingId, address provider) external payable
//! function releaseFunds(uint256 bookingId) external
//! function refund(uint256 bookingId) external
//! event BookingCreated(uint256 indexed bookingId, address indexed provider, uint256 amount)
//! ```
//!
//! [`ChainGateway`] is the seam the booking lifecycle talks to. Two
//! implementations ship here: [`JsonRpcGateway`] drives a real node through
//! a single relayer account, and [`SimulatedChain`] keeps the contract's
//! semantics in process memory.

pub mod abi;
mod error;
mod gateway;
mod key;
pub mod rpc;
pub mod simulated;
mod types;

pub use error::ChainError;
pub use gateway::ChainGateway;
pub use key::EscrowKey;
pub use rpc::{JsonRpcGateway, RpcConfig};
pub use simulated::SimulatedChain;
pub use types::{wei_to_ether, Address, TxReceipt, TxStatus};
