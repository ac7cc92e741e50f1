//! Signature production and aggregation
//!
//! Three ways for an owner to attest to a Safe digest:
//! - Structured: EIP-712 signature over the `SafeTx` document (v = 27/28)
//! - Raw hash: `personal_sign` over the digest bytes (v = 31/32)
//! - On-chain approval: `approveHash(digest)` plus a placeholder entry (v = 1)
//!
//! Every method takes the digest from the same [`SafeTxContext`] and yields a
//! [`SignatureArtifact`]; [`aggregate`] turns any set of them into the blob
//! `execTransaction` expects.

pub mod aggregate;
pub mod approval;
pub mod primitive;
pub mod raw_hash;
pub mod recovery;
pub mod structured;

pub use aggregate::*;
pub use approval::*;
pub use primitive::*;
pub use raw_hash::*;
pub use recovery::*;
pub use structured::*;

use crate::eip712::SafeTxContext;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::types::SignatureArtifact;
use crate::verifier::SafeVerifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How one signer contributes to a Safe transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SignatureMethod {
    Structured,
    RawHash,
    OnChainApproval {
        #[serde(default)]
        skip_on_chain: bool,
    },
}

impl SignatureMethod {
    /// Produce this signer's artifact for `ctx`.
    ///
    /// `verifier` is only contacted by on-chain approval.
    pub fn produce(
        &self,
        signer: &dyn SigningPrimitive,
        ctx: &SafeTxContext,
        verifier: &dyn SafeVerifier,
    ) -> CoordinatorResult<SignatureArtifact> {
        match self {
            SignatureMethod::Structured => sign_structured(signer, ctx),
            SignatureMethod::RawHash => sign_raw_hash(signer, &ctx.digest()),
            SignatureMethod::OnChainApproval { skip_on_chain } => {
                approve_on_chain(signer.address(), verifier, ctx, *skip_on_chain)
            }
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureMethod::Structured => f.write_str("structured"),
            SignatureMethod::RawHash => f.write_str("raw-hash"),
            SignatureMethod::OnChainApproval { skip_on_chain: false } => f.write_str("approve"),
            SignatureMethod::OnChainApproval { skip_on_chain: true } => f.write_str("approve-skip"),
        }
    }
}

impl FromStr for SignatureMethod {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "eip712" | "typed-data" => Ok(SignatureMethod::Structured),
            "raw-hash" | "raw_hash" | "eth-sign" => Ok(SignatureMethod::RawHash),
            "approve" | "on-chain" => Ok(SignatureMethod::OnChainApproval { skip_on_chain: false }),
            "approve-skip" => Ok(SignatureMethod::OnChainApproval { skip_on_chain: true }),
            other => Err(CoordinatorError::invalid_input(format!("unknown signature method {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests;
