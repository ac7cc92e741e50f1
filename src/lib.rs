//! Safe Coordinator Library
//!
//! Client-side coordination of Safe (Gnosis Safe) multi-signature
//! transactions on EVM chains.
//!
//! # Architecture
//!
//! This crate provides:
//! - **tx**: Safe transaction records, contract call encoding, submission
//! - **eip712**: Typed-data hashing and the Safe transaction digest
//! - **signing**: Structured, raw-hash and on-chain approval signatures,
//!   plus aggregation into the blob `execTransaction` expects
//! - **verifier**: The Safe contract over JSON-RPC, or simulated in process
//! - **collect**: Concurrent signature collection with a deadline
//! - **config**: Coordinator settings from JSON, files or the environment
//!
//! # Flow
//!
//! ```text
//! build -> digest -> { sign_structured | sign_raw_hash | approve_on_chain }*
//!       -> aggregate -> submit
//! ```
//!
//! Every signature attests to the same 32-byte digest. Aggregation sorts the
//! entries by signer address, which the Safe requires.
//!
//! # Security
//!
//! Private keys never enter the coordinator. Signing goes through
//! [`signing::SigningPrimitive`]; the bundled [`signing::wallet_from_hex`]
//! loader wipes its intermediate buffers with `zeroize`.
//!
//! # Example
//!
//! ```rust,ignore
//! use safe_coordinator::{aggregate, build, sign_structured, submit, Operation, SafeDomain, SafeTxContext};
//!
//! let tx = build("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", Bytes::new(), Operation::Call, "0")?;
//! let ctx = SafeTxContext::new(SafeDomain::new(safe.address(), chain_id), tx);
//! let blob = aggregate([sign_structured(&alice, &ctx)?, sign_structured(&bob, &ctx)?])?;
//! let receipt = submit(&safe, ctx.transaction(), &blob)?;
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod eip712;
pub mod signing;
pub mod verifier;
pub mod tx;
pub mod config;
pub mod collect;

// Re-export key types for convenience
pub use error::{CoordinatorError, CoordinatorResult, ErrorCode, Stage};
pub use types::*;
pub use config::CoordinatorConfig;

// Re-export the coordination operations
pub use eip712::{digest, digest_for_raw_message, SafeTxContext};
pub use tx::{build, check_nonce, submit, verify_digest_onchain, SafeTransactionBuilder};
pub use signing::{aggregate, approve_on_chain, sign_raw_hash, sign_structured, SignatureMethod, SigningPrimitive};
pub use verifier::{ChainProvider, RpcSafeClient, SafeVerifier, SimulatedSafe};
pub use collect::{collect_signatures, CollectionOutcome, SignatureRequest};

// Re-export crypto utilities for binaries
pub use utils::crypto::{keccak256, to_checksum_address};
