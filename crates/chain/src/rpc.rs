//! Ethereum JSON-RPC gateway.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Transactions go out through
//! `eth_sendTransaction` from the relayer account, so the node (or a signer
//! proxy in front of it) holds the relayer key and assigns nonces. Only one
//! submission per gateway is in flight at a time; confirmation polling runs
//! outside that critical section.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::abi::{event_topic, EscrowCall, BOOKING_CREATED_EVENT};
use crate::error::ChainError;
use crate::gateway::ChainGateway;
use crate::key::EscrowKey;
use crate::types::{Address, TxReceipt, TxStatus};

/// Connection and confirmation settings for [`JsonRpcGateway`].
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub rpc_url: String,
    pub escrow_address: Address,
    pub relayer_address: Address,
    /// Blocks required before a transaction counts as confirmed (min 1).
    pub confirmations: u64,
    pub poll_interval: Duration,
    /// Upper bound on waiting for a submitted transaction to confirm.
    pub confirmation_timeout: Duration,
    /// Per-HTTP-request timeout.
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// The subset of `eth_getTransactionReceipt` this gateway reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    block_number: Option<String>,
    status: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    #[serde(default)]
    topics: Vec<String>,
}

/// [`ChainGateway`] backed by an Ethereum JSON-RPC node.
pub struct JsonRpcGateway {
    config: RpcConfig,
    agent: ureq::Agent,
    request_id: AtomicU64,
    /// Serializes submissions from the relayer account.
    submit_lock: Mutex<()>,
}

impl JsonRpcGateway {
    pub fn new(config: RpcConfig) -> Result<Self, ChainError> {
        if config.rpc_url.is_empty() {
            return Err(ChainError::Misconfigured("rpc_url is empty".to_string()));
        }
        if config.confirmations == 0 {
            return Err(ChainError::Misconfigured(
                "confirmations must be at least 1".to_string(),
            ));
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            .build()
            .into();

        Ok(Self {
            config,
            agent,
            request_id: AtomicU64::new(1),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Make a JSON-RPC call. A `null` result is returned as `Value::Null`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        debug!(method, id, "json-rpc call");

        let agent = self.agent.clone();
        let url = self.config.rpc_url.clone();
        let response = tokio::task::spawn_blocking(move || {
            let response = agent
                .post(&url)
                .send_json(&request)
                .map_err(|e| ChainError::Transport(e.to_string()))?;
            response
                .into_body()
                .read_json::<RpcResponse>()
                .map_err(|e| ChainError::InvalidResponse(format!("not a json-rpc body: {}", e)))
        })
        .await
        .map_err(|e| ChainError::Transport(format!("task join error: {}", e)))??;

        if let Some(error) = response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&value).and_then(to_u64)
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<RawReceipt>, ChainError> {
        let value = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ChainError::InvalidResponse(format!("malformed receipt: {}", e)))
    }

    /// Submit a call from the relayer and return its transaction hash.
    async fn submit(&self, call: &EscrowCall, value_wei: u128) -> Result<String, ChainError> {
        let tx = json!({
            "from": self.config.relayer_address.to_string(),
            "to": self.config.escrow_address.to_string(),
            "data": call.calldata_hex(),
            "value": format!("0x{:x}", value_wei),
        });

        let _guard = self.submit_lock.lock().await;
        let value = self.call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = value
            .as_str()
            .ok_or_else(|| {
                ChainError::InvalidResponse(format!("expected tx hash string, got {}", value))
            })?
            .to_string();

        info!(
            tx_hash = %tx_hash,
            call = call.signature(),
            escrow_key = %call.key(),
            "escrow transaction submitted"
        );
        Ok(tx_hash)
    }

    /// Poll until the transaction has the configured confirmations, reverts,
    /// or the confirmation timeout elapses.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<(TxReceipt, RawReceipt), ChainError> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = self.receipt(tx_hash).await? {
                match mined_status(&receipt)? {
                    None => {}
                    Some(TxStatus::Mined { block_number }) => {
                        let head = if self.config.confirmations <= 1 {
                            block_number
                        } else {
                            self.block_number().await?
                        };
                        let confirmations = head.saturating_sub(block_number) + 1;
                        if confirmations >= self.config.confirmations {
                            return Ok((
                                TxReceipt {
                                    tx_hash: tx_hash.to_string(),
                                    block_number,
                                    confirmations,
                                },
                                receipt,
                            ));
                        }
                    }
                    Some(_) => {
                        return Err(ChainError::Reverted {
                            tx_hash: tx_hash.to_string(),
                        });
                    }
                }
            }

            if started.elapsed() >= self.config.confirmation_timeout {
                return Err(ChainError::Timeout {
                    tx_hash: Some(tx_hash.to_string()),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn execute(&self, call: EscrowCall, value_wei: u128) -> Result<(TxReceipt, RawReceipt), ChainError> {
        let tx_hash = self.submit(&call, value_wei).await?;
        self.wait_for_confirmation(&tx_hash)
            .await
            .map_err(|e| unconfirmed(&tx_hash, e))
    }
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    async fn create_escrow(
        &self,
        key: &EscrowKey,
        provider: &Address,
        amount_wei: u128,
    ) -> Result<TxReceipt, ChainError> {
        let call = EscrowCall::CreateBooking {
            key: *key,
            provider: *provider,
        };
        let (receipt, raw) = self.execute(call, amount_wei).await?;
        if !emitted_booking_created(&raw, key) {
            warn!(
                tx_hash = %receipt.tx_hash,
                escrow_key = %key,
                "receipt carries no BookingCreated log for this key"
            );
        }
        Ok(receipt)
    }

    async fn release_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self.execute(EscrowCall::ReleaseFunds { key: *key }, 0).await?;
        Ok(receipt)
    }

    async fn refund_escrow(&self, key: &EscrowKey) -> Result<TxReceipt, ChainError> {
        let (receipt, _) = self.execute(EscrowCall::Refund { key: *key }, 0).await?;
        Ok(receipt)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, ChainError> {
        if let Some(receipt) = self.receipt(tx_hash).await? {
            if let Some(status) = mined_status(&receipt)? {
                return Ok(status);
            }
        }
        let tx = self
            .call("eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        Ok(if tx.is_null() {
            TxStatus::Unknown
        } else {
            TxStatus::Pending
        })
    }

    async fn relayer_balance(&self) -> Result<u128, ChainError> {
        let value = self
            .call(
                "eth_getBalance",
                json!([self.config.relayer_address.to_string(), "latest"]),
            )
            .await?;
        parse_quantity(&value)
    }

    fn gateway_id(&self) -> &str {
        "jsonrpc"
    }
}

/// Whether the receipt logged `BookingCreated` with `key` as its first indexed topic.
fn emitted_booking_created(receipt: &RawReceipt, key: &EscrowKey) -> bool {
    let topic0 = event_topic(BOOKING_CREATED_EVENT);
    let topic1 = key.to_hex();
    receipt.logs.iter().any(|log| {
        log.topics.first().map(|t| t.eq_ignore_ascii_case(&topic0)) == Some(true)
            && log.topics.get(1).map(|t| t.eq_ignore_ascii_case(&topic1)) == Some(true)
    })
}

/// `Mined` or `Reverted` once the receipt carries a block, `None` before.
fn mined_status(receipt: &RawReceipt) -> Result<Option<TxStatus>, ChainError> {
    let Some(block_hex) = receipt.block_number.as_deref() else {
        return Ok(None);
    };
    if receipt.status.as_deref() == Some("0x0") {
        return Ok(Some(TxStatus::Reverted));
    }
    let block_number = parse_quantity(&Value::String(block_hex.to_string())).and_then(to_u64)?;
    Ok(Some(TxStatus::Mined { block_number }))
}

/// Errors raised while following a broadcast transaction keep its hash.
fn unconfirmed(tx_hash: &str, error: ChainError) -> ChainError {
    match error {
        ChainError::Transport(_) | ChainError::InvalidResponse(_) | ChainError::Rpc { .. } => {
            ChainError::Unconfirmed {
                tx_hash: tx_hash.to_string(),
                reason: error.to_string(),
            }
        }
        other => other,
    }
}

/// Parse a JSON-RPC hex quantity (`"0x1a"`).
fn parse_quantity(value: &Value) -> Result<u128, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::InvalidResponse(format!("expected hex quantity, got {}", value)))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity '{}' lacks 0x prefix", s)))?;
    if digits.is_empty() {
        return Err(ChainError::InvalidResponse("empty quantity".to_string()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("quantity '{}': {}", s, e)))
}

fn to_u64(n: u128) -> Result<u64, ChainError> {
    u64::try_from(n).map_err(|_| ChainError::InvalidResponse(format!("{} does not fit in u64", n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RpcConfig {
        RpcConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            escrow_address: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            relayer_address: "0x2222222222222222222222222222222222222222".parse().unwrap(),
            confirmations: 1,
            poll_interval: Duration::from_millis(10),
            confirmation_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x1a")).unwrap(), 26);
        assert_eq!(parse_quantity(&json!("0xe8d4a51000")).unwrap(), 1_000_000_000_000);
    }

    #[test]
    fn rejects_malformed_quantities() {
        assert!(parse_quantity(&json!("1a")).is_err());
        assert!(parse_quantity(&json!("0x")).is_err());
        assert!(parse_quantity(&json!(26)).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
    }

    #[test]
    fn zero_confirmations_is_misconfigured() {
        let config = RpcConfig {
            confirmations: 0,
            ..test_config()
        };
        assert!(matches!(
            JsonRpcGateway::new(config),
            Err(ChainError::Misconfigured(_))
        ));
    }

    #[test]
    fn empty_url_is_misconfigured() {
        let config = RpcConfig {
            rpc_url: String::new(),
            ..test_config()
        };
        assert!(matches!(
            JsonRpcGateway::new(config),
            Err(ChainError::Misconfigured(_))
        ));
    }

    #[test]
    fn finds_booking_created_log() {
        let key = EscrowKey::derive("booking-1");
        let receipt: RawReceipt = serde_json::from_value(json!({
            "blockNumber": "0x10",
            "status": "0x1",
            "logs": [
                { "topics": [event_topic(BOOKING_CREATED_EVENT), key.to_hex(), "0x00"] }
            ]
        }))
        .unwrap();
        assert!(emitted_booking_created(&receipt, &key));
        assert!(!emitted_booking_created(
            &receipt,
            &EscrowKey::derive("booking-2")
        ));
    }

    #[test]
    fn pending_receipt_has_no_block() {
        let receipt: RawReceipt =
            serde_json::from_value(json!({ "blockNumber": null, "status": null })).unwrap();
        assert!(receipt.block_number.is_none());
        assert!(receipt.logs.is_empty());
    }

    #[test]
    fn receipt_status_maps_to_tx_status() {
        let mined: RawReceipt =
            serde_json::from_value(json!({ "blockNumber": "0x10", "status": "0x1" })).unwrap();
        assert_eq!(
            mined_status(&mined).unwrap(),
            Some(TxStatus::Mined { block_number: 16 })
        );

        let reverted: RawReceipt =
            serde_json::from_value(json!({ "blockNumber": "0x10", "status": "0x0" })).unwrap();
        assert_eq!(mined_status(&reverted).unwrap(), Some(TxStatus::Reverted));

        let pending: RawReceipt =
            serde_json::from_value(json!({ "blockNumber": null, "status": null })).unwrap();
        assert_eq!(mined_status(&pending).unwrap(), None);
    }

    #[test]
    fn polling_failures_after_broadcast_keep_the_hash() {
        let err = unconfirmed("0xabc", ChainError::Transport("connection reset".to_string()));
        assert!(matches!(err, ChainError::Unconfirmed { ref tx_hash, .. } if tx_hash == "0xabc"));

        let reverted = unconfirmed(
            "0xabc",
            ChainError::Reverted {
                tx_hash: "0xabc".to_string(),
            },
        );
        assert!(matches!(reverted, ChainError::Reverted { .. }));

        let timeout = unconfirmed(
            "0xabc",
            ChainError::Timeout {
                tx_hash: Some("0xabc".to_string()),
                waited_secs: 120,
            },
        );
        assert!(matches!(timeout, ChainError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let config = RpcConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            ..test_config()
        };
        let gateway = JsonRpcGateway::new(config).unwrap();
        let err = gateway.relayer_balance().await.unwrap_err();
        assert!(matches!(err, ChainError::Transport(_)), "got {err:?}");
    }
}
