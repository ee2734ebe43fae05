//! `careescrow.toml` loading.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! rate_limit = 60
//! log_format = "json"
//!
//! [chain]
//! rpc_url = "http://127.0.0.1:8545"
//! escrow_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! relayer_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
//! confirmations = 1
//!
//! [escrow]
//! stake_wei = 1000000000000
//!
//! [escrow.payout_addresses]
//! provider-1 = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
//!
//! [auth.sessions]
//! "session-token-abc" = "user-1"
//! ```
//!
//! Every setting is optional in the file. Environment variables
//! (`CARE_RPC_URL`, `CARE_ESCROW_CONTRACT_ADDRESS`, `CARE_RELAYER_ADDRESS`,
//! `CARE_API_KEY`, `CARE_RATE_LIMIT`, `CARE_STAKE_WEI`) override it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use careescrow_booking::{EscrowPolicy, DEFAULT_PAYOUT_ADDRESS, DEFAULT_STAKE_WEI};
use careescrow_chain::{Address, RpcConfig};
use serde::Deserialize;

use crate::logging::LogFormat;

pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("missing chain setting {0} (set it in [chain], via the environment, or pass --simulate-chain)")]
    MissingChain(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CareConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// `[server]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub port: Option<u16>,
    pub rate_limit: Option<u64>,
    pub api_key: Option<String>,
    pub log_format: Option<LogFormat>,
}

/// `[chain]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ChainConfig {
    pub rpc_url: Option<String>,
    pub escrow_address: Option<Address>,
    pub relayer_address: Option<Address>,
    pub confirmations: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub confirmation_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// `[escrow]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EscrowConfig {
    /// TOML integers are signed 64-bit, which caps the stake at about 9.2 ether.
    pub stake_wei: Option<u64>,
    pub default_payout_address: Option<Address>,
    #[serde(default)]
    pub payout_addresses: HashMap<String, Address>,
}

/// `[auth]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AuthConfig {
    /// Session bearer token → user id.
    #[serde(default)]
    pub sessions: HashMap<String, String>,
}

impl CareConfig {
    /// Read `path` if given, then apply environment overrides.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Override file settings with non-empty values from `lookup`.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("CARE_RPC_URL") {
            self.chain.rpc_url = Some(url);
        }
        if let Some(address) = var("CARE_ESCROW_CONTRACT_ADDRESS") {
            self.chain.escrow_address = Some(parse_env("CARE_ESCROW_CONTRACT_ADDRESS", &address)?);
        }
        if let Some(address) = var("CARE_RELAYER_ADDRESS") {
            self.chain.relayer_address = Some(parse_env("CARE_RELAYER_ADDRESS", &address)?);
        }
        if let Some(key) = var("CARE_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(limit) = var("CARE_RATE_LIMIT") {
            self.server.rate_limit = Some(parse_env("CARE_RATE_LIMIT", &limit)?);
        }
        if let Some(stake) = var("CARE_STAKE_WEI") {
            self.escrow.stake_wei = Some(parse_env("CARE_STAKE_WEI", &stake)?);
        }
        Ok(())
    }

    pub(crate) fn rate_limit(&self) -> u64 {
        self.server.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT)
    }

    pub(crate) fn api_key(&self) -> Option<String> {
        self.server.api_key.clone().filter(|k| !k.is_empty())
    }

    pub(crate) fn escrow_policy(&self) -> Result<EscrowPolicy, ConfigError> {
        let stake_wei = self
            .escrow
            .stake_wei
            .map(u128::from)
            .unwrap_or(DEFAULT_STAKE_WEI);
        if stake_wei == 0 {
            return Err(ConfigError::Invalid {
                key: "escrow.stake_wei",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(EscrowPolicy {
            stake_wei,
            default_payout_address: self
                .escrow
                .default_payout_address
                .unwrap_or(DEFAULT_PAYOUT_ADDRESS),
            payout_addresses: self.escrow.payout_addresses.clone(),
        })
    }

    /// Settings for the JSON-RPC gateway. Every address must be present.
    pub(crate) fn rpc_config(&self) -> Result<RpcConfig, ConfigError> {
        let chain = &self.chain;
        let rpc_url = chain
            .rpc_url
            .clone()
            .ok_or(ConfigError::MissingChain("rpc_url (CARE_RPC_URL)"))?;
        let escrow_address = chain.escrow_address.ok_or(ConfigError::MissingChain(
            "escrow_address (CARE_ESCROW_CONTRACT_ADDRESS)",
        ))?;
        let relayer_address = chain.relayer_address.ok_or(ConfigError::MissingChain(
            "relayer_address (CARE_RELAYER_ADDRESS)",
        ))?;

        Ok(RpcConfig {
            rpc_url,
            escrow_address,
            relayer_address,
            confirmations: chain.confirmations.unwrap_or(1),
            poll_interval: Duration::from_millis(chain.poll_interval_ms.unwrap_or(1000)),
            confirmation_timeout: Duration::from_secs(
                chain.confirmation_timeout_secs.unwrap_or(120),
            ),
            request_timeout: Duration::from_secs(chain.request_timeout_secs.unwrap_or(30)),
        })
    }
}

fn parse_env<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
