//! Safe verifier interfaces
//!
//! The coordinator never talks to a chain directly. Everything it needs from
//! the Safe contract goes through [`SafeVerifier`]; [`ChainProvider`] supplies
//! the chain id that binds the digest domain.
//!
//! Two implementations ship with the crate:
//! - [`RpcSafeClient`]: JSON-RPC against a node with unlocked accounts
//! - [`SimulatedSafe`]: in-process replica of the Safe's signature checks

pub mod rpc;
pub mod simulated;

pub use rpc::*;
pub use simulated::*;

use crate::error::CoordinatorResult;
use crate::types::{ExecutionReceipt, SafeDigest, SafeTransaction, SignatureBlob};
use ethers_core::types::{Address, H256, U256};

/// The Safe contract as seen by the coordinator
pub trait SafeVerifier: Send + Sync {
    /// Address of the Safe (the digest's verifying contract)
    fn address(&self) -> Address;

    /// Current Safe nonce
    fn nonce(&self) -> CoordinatorResult<U256>;

    /// `approveHash(digest)` sent from `owner`. Returns the transaction hash.
    fn approve_hash(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<H256>;

    /// `approvedHashes(owner, digest) != 0`
    fn is_hash_approved(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<bool>;

    /// `execTransaction(...)` with the aggregated signatures
    fn exec_transaction(&self, tx: &SafeTransaction, signatures: &SignatureBlob) -> CoordinatorResult<ExecutionReceipt>;

    fn threshold(&self) -> CoordinatorResult<u64>;

    fn owners(&self) -> CoordinatorResult<Vec<Address>>;

    /// The Safe's own `getTransactionHash` for `tx`
    fn transaction_hash(&self, tx: &SafeTransaction) -> CoordinatorResult<SafeDigest>;
}

/// Source of the chain id bound into every digest
pub trait ChainProvider: Send + Sync {
    fn chain_id(&self) -> CoordinatorResult<u64>;
}
