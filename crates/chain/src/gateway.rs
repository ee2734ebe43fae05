use async_trait::async_trait;

use crate::error::ChainError;
use crate::key::EscrowKey;
use crate::types::{Address, TxReceipt, TxStatus};

/// The booking lifecycle's view of the escrow contract.
///
/// Each mutating method submits one transaction from the relayer account
/// and resolves only once that transaction is mined and has the configured
/// number of confirmations. A reverted transaction is an error, never a
/// receipt. Implementations own nonce ordering for the relayer: callers may
/// invoke these methods concurrently.
///
/// Constructed once per process and shared behind an `Arc`.
#[async_trait]
pub trait ChainGateway: Send + Sync + 'static {
    /// `createBooking(key, provider)` carrying `amount_wei` as value.
    async fn create_escrow(
        &self,
        key: &EscrowKey,
        provider: &Address,
        amount_wei: u128,
    ) -> Result<TxReceipt, ChainError>;

    /// `releaseFunds(key)`: pay the escrowed amount to the provider.
    async fn release_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError>;

    /// `refund(key)`: return the escrowed amount to the payer.
    async fn refund_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError>;

    /// Look up a transaction previously submitted by this gateway. Does not
    /// wait for confirmations.
    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError>;

    /// Current balance of the relayer account in wei.
    async fn relayer_balance(&self) -> Result<u128, ChainError>;

    /// Short name for logs and health output.
    fn gateway_id(&self) -> &str;
}
