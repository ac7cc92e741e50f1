//! Shared types for the Safe coordinator
//!
//! These are the values that travel between pipeline stages: the operation
//! record, its digest, per-signer artifacts, the aggregated blob and the
//! execution receipt.

use crate::error::{CoordinatorError, CoordinatorResult};
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of one Safe signature entry (r || s || v)
pub const SIGNATURE_LENGTH: usize = 65;

// =============================================================================
// Operation record
// =============================================================================

/// Call type executed by the Safe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Operation {
    #[default]
    Call,
    DelegateCall,
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> u8 {
        match op {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(format!("unknown operation {}", other)),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "0" => Ok(Operation::Call),
            "delegatecall" | "delegate-call" | "delegate_call" | "1" => Ok(Operation::DelegateCall),
            other => Err(CoordinatorError::invalid_input(format!("unknown operation {:?}", other))),
        }
    }
}

/// One proposed Safe transaction (the operation record that gets signed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
}

impl SafeTransaction {
    /// A plain call to `to` with every optional field at its zero value
    pub fn new(to: Address, nonce: U256) -> Self {
        Self {
            to,
            value: U256::zero(),
            data: Bytes::default(),
            operation: Operation::Call,
            safe_tx_gas: U256::zero(),
            base_gas: U256::zero(),
            gas_price: U256::zero(),
            gas_token: Address::zero(),
            refund_receiver: Address::zero(),
            nonce,
        }
    }
}

/// The EIP-712 domain of a Safe: its address and the chain it lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeDomain {
    pub verifying_contract: Address,
    pub chain_id: u64,
}

impl SafeDomain {
    pub fn new(verifying_contract: Address, chain_id: u64) -> Self {
        Self {
            verifying_contract,
            chain_id,
        }
    }
}

// =============================================================================
// Digest
// =============================================================================

/// 32-byte EIP-712 digest identifying one operation for one Safe on one chain
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafeDigest(H256);

impl SafeDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(H256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_fixed_bytes()
    }

    pub fn as_h256(&self) -> H256 {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl From<H256> for SafeDigest {
    fn from(hash: H256) -> Self {
        Self(hash)
    }
}

impl fmt::Debug for SafeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for SafeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// =============================================================================
// Signature artifacts
// =============================================================================

/// How the Safe will interpret a 65-byte signature entry, read from its
/// trailing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// v = 0, EIP-1271 contract signature (never produced here)
    Contract,
    /// v = 1, pre-approved hash recorded with `approveHash`
    ApprovedHash,
    /// v = 27/28, ECDSA over the digest itself
    Ecdsa,
    /// v = 31/32, ECDSA over the EIP-191 prefixed digest
    EthSign,
    Unknown(u8),
}

impl SignatureKind {
    pub fn from_marker(v: u8) -> Self {
        match v {
            0 => SignatureKind::Contract,
            1 => SignatureKind::ApprovedHash,
            27 | 28 => SignatureKind::Ecdsa,
            31 | 32 => SignatureKind::EthSign,
            other => SignatureKind::Unknown(other),
        }
    }
}

/// One signer's contribution to a Safe transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureArtifact {
    pub signer: Address,
    pub data: Bytes,
}

impl SignatureArtifact {
    pub fn new(signer: Address, data: impl Into<Bytes>) -> Self {
        Self {
            signer,
            data: data.into(),
        }
    }

    /// Trailing marker byte, if the payload is non-empty
    pub fn marker(&self) -> Option<u8> {
        self.data.last().copied()
    }

    pub fn kind(&self) -> Option<SignatureKind> {
        self.marker().map(SignatureKind::from_marker)
    }
}

/// Canonical concatenation of signature entries, ascending by signer address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureBlob(Bytes);

impl SignatureBlob {
    /// Wrap bytes produced elsewhere. No ordering or length check is applied.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of complete 65-byte entries
    pub fn signature_count(&self) -> usize {
        self.0.len() / SIGNATURE_LENGTH
    }

    /// Split into 65-byte entries; fails when the length is not a multiple of 65
    pub fn entries(&self) -> CoordinatorResult<Vec<&[u8]>> {
        if self.0.len() % SIGNATURE_LENGTH != 0 {
            return Err(CoordinatorError::invalid_input(format!(
                "signature blob length {} is not a multiple of {}",
                self.0.len(),
                SIGNATURE_LENGTH
            )));
        }
        Ok(self.0.chunks(SIGNATURE_LENGTH).collect())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Outcome of a successful `execTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub transaction_hash: H256,
    pub safe_tx_hash: SafeDigest,
    pub nonce: U256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl ExecutionReceipt {
    /// Turn a mined transaction whose inner call failed (`ExecutionFailure`)
    /// into an error. The nonce is consumed either way.
    pub fn ensure_success(self) -> CoordinatorResult<Self> {
        if self.success {
            return Ok(self);
        }
        Err(CoordinatorError::execution_reverted(Some("ExecutionFailure".to_string()))
            .with_stage(crate::error::Stage::Submit))
    }
}
