//! JSON-RPC Safe client
//!
//! Talks to a node that holds the owners' and executor's accounts unlocked
//! (a Hardhat or Anvil node, or a signing proxy) and sends Safe calls with
//! `eth_sendTransaction`. Every state-changing call is preflighted with
//! `eth_call` so reverts surface with the Safe's reason string.

use super::{ChainProvider, SafeVerifier};
use crate::error::{CoordinatorError, CoordinatorResult, ErrorCode, Stage};
use crate::types::{ExecutionReceipt, SafeDigest, SafeTransaction, SignatureBlob};
use crate::utils::crypto::{keccak256, to_hex_prefixed};
use crate::{log_debug, log_info, log_warn};
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{Address, Bytes, H256, U256, U64};
use ethers_core::utils::id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// `Error(string)` selector used by Solidity `require`/`revert`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

const EXEC_TRANSACTION: &str =
    "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)";
const GET_TRANSACTION_HASH: &str =
    "getTransactionHash(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,uint256)";
const EXECUTION_FAILURE_EVENT: &str = "ExecutionFailure(bytes32,uint256)";

/// RPC request structure
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: H256,
    block_number: Option<U64>,
    gas_used: Option<U256>,
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    #[serde(default)]
    topics: Vec<H256>,
}

/// Blocking JSON-RPC client for one Safe
#[derive(Debug)]
pub struct RpcSafeClient {
    url: String,
    safe: Address,
    executor: Option<Address>,
    client: reqwest::blocking::Client,
    receipt_poll_attempts: u32,
    receipt_poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcSafeClient {
    pub fn new(url: &str, safe: Address, timeout: Duration) -> CoordinatorResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoordinatorError::config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            safe,
            executor: None,
            client,
            receipt_poll_attempts: 30,
            receipt_poll_interval: Duration::from_millis(1000),
            next_id: AtomicU64::new(1),
        })
    }

    /// Account that sends `execTransaction`. Defaults to the node's first
    /// account.
    pub fn with_executor(mut self, executor: Address) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_receipt_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.receipt_poll_attempts = attempts.max(1);
        self.receipt_poll_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    fn request<R: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> CoordinatorResult<Option<R>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self.client.post(&self.url).json(&request).send()?;
        if !response.status().is_success() {
            return Err(CoordinatorError::transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: RpcResponse<R> = response
            .json()
            .map_err(|e| CoordinatorError::parse_error(format!("invalid {} response: {}", method, e)))?;

        if let Some(error) = body.error {
            return Err(rpc_error_to_coordinator(method, error));
        }
        Ok(body.result)
    }

    fn call_rpc<R: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> CoordinatorResult<R> {
        self.request(method, params)?
            .ok_or_else(|| CoordinatorError::parse_error(format!("{} returned no result", method)))
    }

    fn eth_call(&self, from: Option<Address>, data: &[u8]) -> CoordinatorResult<Vec<u8>> {
        let mut call = json!({ "to": self.safe, "data": to_hex_prefixed(data) });
        if let Some(from) = from {
            call["from"] = json!(from);
        }
        let result: Bytes = self.call_rpc("eth_call", json!([call, "latest"]))?;
        Ok(result.to_vec())
    }

    fn default_account(&self) -> CoordinatorResult<Address> {
        let accounts: Vec<Address> = self.call_rpc("eth_accounts", json!([]))?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| CoordinatorError::config("node exposes no unlocked accounts"))
    }

    /// Preflight, send and wait for the receipt of a Safe call from `from`
    fn send_transaction(&self, from: Address, data: &[u8]) -> CoordinatorResult<RpcReceipt> {
        self.eth_call(Some(from), data)?;

        let tx = json!({ "from": from, "to": self.safe, "data": to_hex_prefixed(data) });
        let tx_hash: H256 = self.call_rpc("eth_sendTransaction", json!([tx]))?;
        log_debug!("rpc", "transaction sent", from = from, tx_hash = tx_hash);

        let receipt = self.wait_for_receipt(tx_hash)?;
        if receipt.status == Some(U64::zero()) {
            return Err(CoordinatorError::execution_reverted(None)
                .with_details(format!("transaction {:?} mined with status 0", tx_hash)));
        }
        Ok(receipt)
    }

    fn wait_for_receipt(&self, tx_hash: H256) -> CoordinatorResult<RpcReceipt> {
        for attempt in 0..self.receipt_poll_attempts {
            if let Some(receipt) = self.request::<RpcReceipt>("eth_getTransactionReceipt", json!([tx_hash]))? {
                return Ok(receipt);
            }
            if attempt + 1 < self.receipt_poll_attempts {
                std::thread::sleep(self.receipt_poll_interval);
            }
        }
        Err(CoordinatorError::transport(format!(
            "no receipt for {:?} after {} attempts",
            tx_hash, self.receipt_poll_attempts
        )))
    }

    fn call_view(&self, signature: &str, args: &[Token], outputs: &[ParamType]) -> CoordinatorResult<Vec<Token>> {
        let raw = self.eth_call(None, &encode_call(signature, args))?;
        Ok(abi::decode(outputs, &raw)?)
    }
}

impl SafeVerifier for RpcSafeClient {
    fn address(&self) -> Address {
        self.safe
    }

    fn nonce(&self) -> CoordinatorResult<U256> {
        let tokens = self.call_view("nonce()", &[], &[ParamType::Uint(256)])?;
        first_uint(tokens)
    }

    fn approve_hash(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<H256> {
        let data = encode_call("approveHash(bytes32)", &[Token::FixedBytes(digest.as_bytes().to_vec())]);
        let receipt = self.send_transaction(owner, &data).map_err(|e| match e.code {
            ErrorCode::ExecutionReverted => {
                let reason = e.revert_reason().map(str::to_string);
                let err = CoordinatorError::approval_rejected(e.message.clone());
                match reason {
                    Some(reason) => err.with_details(reason),
                    None => err,
                }
            }
            ErrorCode::TransportError => CoordinatorError::provider_unavailable(e.message.clone()),
            _ => e,
        })?;
        Ok(receipt.transaction_hash)
    }

    fn is_hash_approved(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<bool> {
        let tokens = self.call_view(
            "approvedHashes(address,bytes32)",
            &[Token::Address(owner), Token::FixedBytes(digest.as_bytes().to_vec())],
            &[ParamType::Uint(256)],
        )?;
        Ok(!first_uint(tokens)?.is_zero())
    }

    fn exec_transaction(&self, tx: &SafeTransaction, signatures: &SignatureBlob) -> CoordinatorResult<ExecutionReceipt> {
        let executor = match self.executor {
            Some(executor) => executor,
            None => self.default_account()?,
        };

        let nonce = self.nonce()?;
        let mut at_nonce = tx.clone();
        at_nonce.nonce = nonce;
        let safe_tx_hash = self.transaction_hash(&at_nonce)?;

        let mut args = safe_tx_tokens(tx);
        args.push(Token::Bytes(signatures.as_bytes().to_vec()));
        let data = encode_call(EXEC_TRANSACTION, &args);

        let receipt = self.send_transaction(executor, &data)?;

        let failure_topic = H256::from(keccak256(EXECUTION_FAILURE_EVENT.as_bytes()));
        let inner_failed = receipt
            .logs
            .iter()
            .any(|log| log.address == self.safe && log.topics.first() == Some(&failure_topic));
        if inner_failed {
            log_warn!("rpc", "Safe reported ExecutionFailure", safe_tx_hash = safe_tx_hash);
        }

        log_info!(
            "rpc",
            "execTransaction mined",
            tx_hash = receipt.transaction_hash,
            safe_tx_hash = safe_tx_hash,
            nonce = nonce
        );

        Ok(ExecutionReceipt {
            transaction_hash: receipt.transaction_hash,
            safe_tx_hash,
            nonce,
            success: !inner_failed,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        })
    }

    fn threshold(&self) -> CoordinatorResult<u64> {
        let tokens = self.call_view("getThreshold()", &[], &[ParamType::Uint(256)])?;
        let threshold = first_uint(tokens)?;
        if threshold > U256::from(u64::MAX) {
            return Err(CoordinatorError::parse_error("threshold does not fit in u64"));
        }
        Ok(threshold.as_u64())
    }

    fn owners(&self) -> CoordinatorResult<Vec<Address>> {
        let tokens = self.call_view("getOwners()", &[], &[ParamType::Array(Box::new(ParamType::Address))])?;
        match tokens.into_iter().next() {
            Some(Token::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Token::Address(address) => Ok(address),
                    other => Err(CoordinatorError::parse_error(format!("unexpected owner token {:?}", other))),
                })
                .collect(),
            other => Err(CoordinatorError::parse_error(format!("unexpected getOwners output {:?}", other))),
        }
    }

    fn transaction_hash(&self, tx: &SafeTransaction) -> CoordinatorResult<SafeDigest> {
        let mut args = safe_tx_tokens(tx);
        args.push(Token::Uint(tx.nonce));
        let tokens = self.call_view(GET_TRANSACTION_HASH, &args, &[ParamType::FixedBytes(32)])?;
        match tokens.into_iter().next() {
            Some(Token::FixedBytes(bytes)) if bytes.len() == 32 => Ok(SafeDigest::from(H256::from_slice(&bytes))),
            other => Err(CoordinatorError::parse_error(format!(
                "unexpected getTransactionHash output {:?}",
                other
            ))),
        }
    }
}

impl ChainProvider for RpcSafeClient {
    fn chain_id(&self) -> CoordinatorResult<u64> {
        let chain_id: U64 = self
            .call_rpc("eth_chainId", json!([]))
            .map_err(|e| e.with_stage(Stage::Config))?;
        Ok(chain_id.as_u64())
    }
}

/// Selector followed by the ABI-encoded arguments
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&abi::encode(args));
    data
}

/// The nine `SafeTx` fields shared by `execTransaction` and
/// `getTransactionHash`, in call order
fn safe_tx_tokens(tx: &SafeTransaction) -> Vec<Token> {
    vec![
        Token::Address(tx.to),
        Token::Uint(tx.value),
        Token::Bytes(tx.data.to_vec()),
        Token::Uint(U256::from(u8::from(tx.operation))),
        Token::Uint(tx.safe_tx_gas),
        Token::Uint(tx.base_gas),
        Token::Uint(tx.gas_price),
        Token::Address(tx.gas_token),
        Token::Address(tx.refund_receiver),
    ]
}

fn first_uint(tokens: Vec<Token>) -> CoordinatorResult<U256> {
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(CoordinatorError::parse_error(format!("expected uint, got {:?}", other))),
    }
}

/// Decode `Error(string)` revert data into its reason
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    match abi::decode(&[ParamType::String], payload).ok()?.into_iter().next() {
        Some(Token::String(reason)) => Some(reason),
        _ => None,
    }
}

/// Revert data nodes attach to the error, either directly or nested
fn revert_data(data: &Value) -> Option<Vec<u8>> {
    let raw = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => return map.get("data").and_then(revert_data),
        _ => return None,
    };
    hex::decode(raw.trim_start_matches("0x")).ok()
}

/// Hardhat embeds the reason in the message: "... reverted with reason string 'GS026'"
fn reason_from_message(message: &str) -> Option<String> {
    let start = message.find("reason string '")? + "reason string '".len();
    let end = message[start..].find('\'')?;
    Some(message[start..start + end].to_string())
}

fn rpc_error_to_coordinator(method: &str, error: RpcError) -> CoordinatorError {
    let reason = error
        .data
        .as_ref()
        .and_then(revert_data)
        .and_then(|data| decode_revert_reason(&data))
        .or_else(|| reason_from_message(&error.message));

    let is_revert = reason.is_some() || error.code == 3 || error.message.contains("revert");
    if is_revert {
        return CoordinatorError::execution_reverted(reason);
    }

    CoordinatorError::transport(format!("{} failed: {} ({})", method, error.message, error.code))
}
