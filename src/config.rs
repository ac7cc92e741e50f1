//! Coordinator configuration
//!
//! Loaded from a JSON file or from `SAFE_*` environment variables (a `.env`
//! file in the working directory is honoured). Key material never lives here.

use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::utils::crypto::parse_address;
use crate::verifier::RpcSafeClient;
use crate::log_warn;
use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Runtime settings for one Safe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    pub safe_address: Address,
    /// Overrides `eth_chainId` when set
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Account sending `execTransaction`
    #[serde(default)]
    pub executor: Option<Address>,
    #[serde(default)]
    pub skip_on_chain_approval: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// How long collection waits for slow signers; unset waits forever
    #[serde(default)]
    pub signer_timeout_secs: Option<u64>,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_receipt_poll_attempts() -> u32 {
    30
}

fn default_receipt_poll_interval_ms() -> u64 {
    1000
}

impl CoordinatorConfig {
    pub fn new(safe_address: Address) -> Self {
        Self {
            rpc_url: default_rpc_url(),
            safe_address,
            chain_id: None,
            executor: None,
            skip_on_chain_approval: false,
            request_timeout_secs: default_request_timeout_secs(),
            receipt_poll_attempts: default_receipt_poll_attempts(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            signer_timeout_secs: None,
        }
    }

    pub fn from_json(json: &str) -> CoordinatorResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoordinatorError::config(format!("invalid config JSON: {}", e)).with_stage(Stage::Config))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CoordinatorResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoordinatorError::config(format!("cannot read {}: {}", path.display(), e)).with_stage(Stage::Config)
        })?;
        Self::from_json(&raw)
    }

    /// Read `SAFE_*` variables, after loading `.env` if present
    pub fn from_env() -> CoordinatorResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> CoordinatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let in_config = |e: CoordinatorError| e.with_stage(Stage::Config);

        let safe_raw = lookup("SAFE_ADDRESS")
            .ok_or_else(|| CoordinatorError::config("SAFE_ADDRESS is not set").with_stage(Stage::Config))?;
        let mut config = Self::new(parse_address(&safe_raw).map_err(in_config)?);

        if let Some(url) = lookup("SAFE_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(chain_id) = lookup("SAFE_CHAIN_ID") {
            config.chain_id = Some(parse_number("SAFE_CHAIN_ID", &chain_id)?);
        }
        if let Some(executor) = lookup("SAFE_EXECUTOR") {
            config.executor = Some(parse_address(&executor).map_err(in_config)?);
        }
        if let Some(skip) = lookup("SAFE_SKIP_ON_CHAIN_APPROVAL") {
            config.skip_on_chain_approval = parse_bool("SAFE_SKIP_ON_CHAIN_APPROVAL", &skip)?;
        }
        if let Some(secs) = lookup("SAFE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("SAFE_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(attempts) = lookup("SAFE_RECEIPT_POLL_ATTEMPTS") {
            config.receipt_poll_attempts = parse_number("SAFE_RECEIPT_POLL_ATTEMPTS", &attempts)?;
        }
        if let Some(ms) = lookup("SAFE_RECEIPT_POLL_INTERVAL_MS") {
            config.receipt_poll_interval_ms = parse_number("SAFE_RECEIPT_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(secs) = lookup("SAFE_SIGNER_TIMEOUT_SECS") {
            config.signer_timeout_secs = Some(parse_number("SAFE_SIGNER_TIMEOUT_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings. Returns warnings that do not block use.
    ///
    /// Plain HTTP is accepted for local hosts only.
    pub fn validate(&self) -> CoordinatorResult<Vec<String>> {
        let mut warnings = Vec::new();
        let fail = |msg: String| Err(CoordinatorError::config(msg).with_stage(Stage::Config));

        let parsed = Url::parse(&self.rpc_url).map_err(|e| CoordinatorError::from(e).with_stage(Stage::Config))?;
        match parsed.scheme() {
            "https" => {}
            "http" => {
                let host = parsed.host_str().unwrap_or_default();
                if is_local_host(host) {
                    warnings.push(format!("plain HTTP to {} allowed for local development only", host));
                } else {
                    return fail(format!("HTTPS required for remote endpoint {}", host));
                }
            }
            other => return fail(format!("unsupported RPC scheme {:?}", other)),
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            warnings.push("credentials in RPC URL, make sure it is not logged".to_string());
        }

        if self.safe_address.is_zero() {
            return fail("Safe address cannot be the zero address".to_string());
        }
        if self.chain_id == Some(0) {
            return fail("chain id cannot be 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return fail("request timeout must be at least one second".to_string());
        }
        if self.receipt_poll_attempts == 0 {
            return fail("receipt poll attempts must be at least 1".to_string());
        }
        if self.signer_timeout_secs == Some(0) {
            return fail("signer timeout must be at least one second".to_string());
        }

        for warning in &warnings {
            log_warn!("config", warning.as_str());
        }
        Ok(warnings)
    }

    pub fn signer_timeout(&self) -> Option<Duration> {
        self.signer_timeout_secs.map(Duration::from_secs)
    }

    /// JSON-RPC client for the configured Safe
    pub fn rpc_client(&self) -> CoordinatorResult<RpcSafeClient> {
        let client = RpcSafeClient::new(
            &self.rpc_url,
            self.safe_address,
            Duration::from_secs(self.request_timeout_secs),
        )?
        .with_receipt_polling(
            self.receipt_poll_attempts,
            Duration::from_millis(self.receipt_poll_interval_ms),
        );

        Ok(match self.executor {
            Some(executor) => client.with_executor(executor),
            None => client,
        })
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host.starts_with("192.168.")
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> CoordinatorResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CoordinatorError::config(format!("{} must be a number, got {:?}", key, raw)).with_stage(Stage::Config))
}

fn parse_bool(key: &str, raw: &str) -> CoordinatorResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(CoordinatorError::config(format!("{} must be a boolean, got {:?}", key, other)).with_stage(Stage::Config)),
    }
}
