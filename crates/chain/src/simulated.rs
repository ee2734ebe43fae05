//! In-process escrow contract.
//!
//! Mirrors the deployed contract's rules so the booking lifecycle can be
//! driven without a node:
//!
//! - `createBooking` reverts on zero value or an already-used key
//! - `releaseFunds` and `refund` revert unless the escrow exists and is
//!   still open, so a second release reverts harmlessly
//!
//! Every accepted call mines one block. Failures for the next calls can be
//! queued with [`SimulatedChain::fail_next`]. [`SimulatedChain::hold_next`]
//! leaves a call broadcast but unmined, so it times out for the caller and
//! can still be mined (or dropped) later.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::abi::EscrowCall;
use crate::error::ChainError;
use crate::gateway::ChainGateway;
use crate::key::{keccak256, EscrowKey};
use crate::types::{Address, TxReceipt, TxStatus};

/// Default relayer funding: 1 ether.
pub const DEFAULT_RELAYER_BALANCE_WEI: u128 = 1_000_000_000_000_000_000;

/// On-chain state of one escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowState {
    pub provider: Address,
    pub amount_wei: u128,
    pub released: bool,
    pub refunded: bool,
}

impl EscrowState {
    fn is_open(&self) -> bool {
        !self.released && !self.refunded
    }
}

/// What became of a submitted transaction.
#[derive(Debug, Clone, Copy)]
enum SimTx {
    Held { call: EscrowCall, value_wei: u128 },
    Mined { block_number: u64 },
    Reverted,
}

#[derive(Debug)]
struct ChainState {
    block_number: u64,
    tx_count: u64,
    relayer_balance: u128,
    escrows: HashMap<EscrowKey, EscrowState>,
    injected: VecDeque<ChainError>,
    calls: Vec<EscrowCall>,
    txs: HashMap<String, SimTx>,
    /// Held transaction hashes in submission order.
    held: Vec<String>,
    holds_pending: usize,
}

impl ChainState {
    /// Include one transaction in a new block and apply the contract rules.
    fn mine(&mut self, tx_hash: String, call: EscrowCall, value_wei: u128) -> Result<TxReceipt, ChainError> {
        self.block_number += 1;
        self.calls.push(call);
        let block_number = self.block_number;

        let accepted = match call {
            EscrowCall::CreateBooking { key, provider } => {
                if value_wei == 0
                    || self.relayer_balance < value_wei
                    || self.escrows.contains_key(&key)
                {
                    false
                } else {
                    self.relayer_balance -= value_wei;
                    self.escrows.insert(
                        key,
                        EscrowState {
                            provider,
                            amount_wei: value_wei,
                            released: false,
                            refunded: false,
                        },
                    );
                    true
                }
            }
            EscrowCall::ReleaseFunds { key } => match self.escrows.get_mut(&key) {
                Some(escrow) if escrow.is_open() => {
                    escrow.released = true;
                    true
                }
                _ => false,
            },
            EscrowCall::Refund { key } => {
                let refunded = match self.escrows.get_mut(&key) {
                    Some(escrow) if escrow.is_open() => {
                        escrow.refunded = true;
                        Some(escrow.amount_wei)
                    }
                    _ => None,
                };
                match refunded {
                    Some(amount) => {
                        self.relayer_balance += amount;
                        true
                    }
                    None => false,
                }
            }
        };

        if !accepted {
            self.txs.insert(tx_hash.clone(), SimTx::Reverted);
            return Err(ChainError::Reverted { tx_hash });
        }

        info!(
            tx_hash = %tx_hash,
            call = call.signature(),
            escrow_key = %call.key(),
            block_number,
            "simulated escrow transaction mined"
        );
        self.txs.insert(tx_hash.clone(), SimTx::Mined { block_number });
        Ok(TxReceipt {
            tx_hash,
            block_number,
            confirmations: 1,
        })
    }
}

/// [`ChainGateway`] over an in-memory escrow contract.
#[derive(Debug)]
pub struct SimulatedChain {
    state: Mutex<ChainState>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::with_balance(DEFAULT_RELAYER_BALANCE_WEI)
    }
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(relayer_balance: u128) -> Self {
        Self {
            state: Mutex::new(ChainState {
                block_number: 0,
                tx_count: 0,
                relayer_balance,
                escrows: HashMap::new(),
                injected: VecDeque::new(),
                calls: Vec::new(),
                txs: HashMap::new(),
                held: Vec::new(),
                holds_pending: 0,
            }),
        }
    }

    /// Make the next gateway call fail with `error` before touching state.
    pub async fn fail_next(&self, error: ChainError) {
        self.state.lock().await.injected.push_back(error);
    }

    /// Broadcast the next call without mining it. The caller gets a
    /// `Timeout` carrying the transaction hash.
    pub async fn hold_next(&self) {
        self.state.lock().await.holds_pending += 1;
    }

    /// Mine every held transaction in submission order.
    pub async fn mine_held(&self) -> Vec<Result<TxReceipt, ChainError>> {
        let mut state = self.state.lock().await;
        let mut mined = Vec::new();
        for tx_hash in std::mem::take(&mut state.held) {
            if let Some(SimTx::Held { call, value_wei }) = state.txs.get(&tx_hash).copied() {
                mined.push(state.mine(tx_hash, call, value_wei));
            }
        }
        mined
    }

    /// Forget every held transaction, as a node evicting it from its mempool.
    pub async fn drop_held(&self) {
        let mut state = self.state.lock().await;
        for tx_hash in std::mem::take(&mut state.held) {
            state.txs.remove(&tx_hash);
        }
    }

    /// The escrow stored under `key`, if any.
    pub async fn escrow(&self, key: &EscrowKey) -> Option<EscrowState> {
        self.state.lock().await.escrows.get(key).cloned()
    }

    /// Every call that reached the contract, reverted ones included.
    pub async fn calls(&self) -> Vec<EscrowCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.block_number
    }

    async fn execute(&self, call: EscrowCall, value_wei: u128) -> Result<TxReceipt, ChainError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.injected.pop_front() {
            return Err(error);
        }
        if state.relayer_balance < value_wei {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }

        state.tx_count += 1;
        let tx_hash = simulated_tx_hash(state.tx_count);

        if state.holds_pending > 0 {
            state.holds_pending -= 1;
            state.held.push(tx_hash.clone());
            state
                .txs
                .insert(tx_hash.clone(), SimTx::Held { call, value_wei });
            info!(
                tx_hash = %tx_hash,
                call = call.signature(),
                escrow_key = %call.key(),
                "simulated escrow transaction held unmined"
            );
            return Err(ChainError::Timeout {
                tx_hash: Some(tx_hash),
                waited_secs: 0,
            });
        }

        state.mine(tx_hash, call, value_wei)
    }
}

fn simulated_tx_hash(n: u64) -> String {
    let mut seed = b"careescrow-simulated-tx:".to_vec();
    seed.extend_from_slice(&n.to_be_bytes());
    format!("0x{}", hex::encode(keccak256(&seed)))
}

#[async_trait]
impl ChainGateway for SimulatedChain {
    async fn create_escrow(
        &self,
        key: &EscrowKey,
        provider: &Address,
        amount_wei: u128,
    ) -> Result<TxReceipt, ChainError> {
        self.execute(
            EscrowCall::CreateBooking {
                key: *key,
                provider: *provider,
            },
            amount_wei,
        )
        .await
    }

    async fn release_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError> {
        self.execute(EscrowCall::ReleaseFunds { key: *key }, 0).await
    }

    async fn refund_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError> {
        self.execute(EscrowCall::Refund { key: *key }, 0).await
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        let state = self.state.lock().await;
        Ok(match state.txs.get(tx_hash) {
            None => TxStatus::Unknown,
            Some(SimTx::Held { .. }) => TxStatus::Pending,
            Some(SimTx::Reverted) => TxStatus::Reverted,
            Some(SimTx::Mined { block_number }) => TxStatus::Mined {
                block_number: *block_number,
            },
        })
    }

    async fn relayer_balance(&self) -> Result<u128, ChainError> {
        Ok(self.state.lock().await.relayer_balance)
    }

    fn gateway_id(&self) -> &str {
        "simulated"
    }
}
