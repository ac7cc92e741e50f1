//! In-process Safe
//!
//! Reproduces the parts of the Safe contract the coordinator depends on:
//! owner set, threshold, nonce, `approveHash` bookkeeping and the
//! `checkNSignatures` walk over a signature blob. Reverts carry the Safe's
//! own reason codes:
//!
//! | code  | meaning                                        |
//! |-------|------------------------------------------------|
//! | GS020 | signature data shorter than `threshold * 65`   |
//! | GS024 | contract signature (unsupported here)          |
//! | GS025 | approved-hash entry without a recorded approval |
//! | GS026 | signer not an owner, or not strictly ascending |
//! | GS030 | `approveHash` from a non-owner                 |

use super::{ChainProvider, SafeVerifier};
use crate::eip712::digest;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::signing::recover_signer;
use crate::types::{ExecutionReceipt, SafeDigest, SafeTransaction, SignatureBlob, SignatureKind, SIGNATURE_LENGTH};
use crate::utils::crypto::keccak256;
use crate::{log_debug, log_info};
use ethers_core::types::{Address, H256, U256};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct SafeState {
    nonce: U256,
    approved: HashSet<(Address, SafeDigest)>,
    executed: Vec<SafeDigest>,
}

/// A Safe living in memory
#[derive(Debug)]
pub struct SimulatedSafe {
    address: Address,
    chain_id: u64,
    owners: BTreeSet<Address>,
    threshold: u64,
    executor: Option<Address>,
    state: Mutex<SafeState>,
}

impl SimulatedSafe {
    /// Set up a Safe the way `setup(owners, threshold, ...)` would
    pub fn new(address: Address, chain_id: u64, owners: Vec<Address>, threshold: u64) -> CoordinatorResult<Self> {
        let mut owner_set = BTreeSet::new();
        for owner in owners {
            if owner.is_zero() {
                return Err(CoordinatorError::invalid_input("zero address cannot be an owner"));
            }
            if !owner_set.insert(owner) {
                return Err(CoordinatorError::invalid_input(format!("duplicate owner {:?}", owner)));
            }
        }

        if threshold == 0 || threshold > owner_set.len() as u64 {
            return Err(CoordinatorError::invalid_input(format!(
                "threshold {} invalid for {} owners",
                threshold,
                owner_set.len()
            )));
        }

        Ok(Self {
            address,
            chain_id,
            owners: owner_set,
            threshold,
            executor: None,
            state: Mutex::new(SafeState::default()),
        })
    }

    /// Start from a nonce other than zero
    pub fn with_nonce(self, nonce: U256) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.nonce = nonce;
        }
        self
    }

    /// Account that submits `execTransaction`. An owner submitting counts as
    /// having approved, as `msg.sender` does on chain.
    pub fn with_executor(mut self, executor: Address) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Digests executed so far, oldest first
    pub fn executed(&self) -> CoordinatorResult<Vec<SafeDigest>> {
        Ok(self.lock()?.executed.clone())
    }

    fn lock(&self) -> CoordinatorResult<MutexGuard<'_, SafeState>> {
        self.state
            .lock()
            .map_err(|_| CoordinatorError::internal("simulated safe state poisoned"))
    }

    fn hash_at(&self, tx: &SafeTransaction, nonce: U256) -> SafeDigest {
        let mut at_nonce = tx.clone();
        at_nonce.nonce = nonce;
        digest(self.address, self.chain_id, &at_nonce)
    }

    /// The `checkNSignatures` walk. Only the first `threshold` entries count.
    fn check_signatures(&self, state: &SafeState, hash: &SafeDigest, signatures: &[u8]) -> Result<(), &'static str> {
        let required = self.threshold as usize;
        if signatures.len() < required * SIGNATURE_LENGTH {
            return Err("GS020");
        }

        let mut last_owner = Address::zero();
        for entry in signatures.chunks(SIGNATURE_LENGTH).take(required) {
            let current_owner = match SignatureKind::from_marker(entry[64]) {
                SignatureKind::Contract => return Err("GS024"),
                SignatureKind::ApprovedHash => {
                    let owner = Address::from_slice(&entry[12..32]);
                    let by_sender = self.executor == Some(owner);
                    if !by_sender && !state.approved.contains(&(owner, *hash)) {
                        return Err("GS025");
                    }
                    owner
                }
                // ecrecover yields the zero address on failure
                _ => recover_signer(hash, entry).unwrap_or_else(|_| Address::zero()),
            };

            if current_owner <= last_owner || !self.owners.contains(&current_owner) {
                return Err("GS026");
            }
            last_owner = current_owner;
        }

        Ok(())
    }
}

impl SafeVerifier for SimulatedSafe {
    fn address(&self) -> Address {
        self.address
    }

    fn nonce(&self) -> CoordinatorResult<U256> {
        Ok(self.lock()?.nonce)
    }

    fn approve_hash(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<H256> {
        if !self.owners.contains(&owner) {
            return Err(CoordinatorError::approval_rejected("approveHash reverted: GS030").with_details("GS030"));
        }

        self.lock()?.approved.insert((owner, *digest));

        let mut preimage = Vec::with_capacity(52);
        preimage.extend_from_slice(owner.as_bytes());
        preimage.extend_from_slice(digest.as_bytes());
        Ok(H256::from(keccak256(&preimage)))
    }

    fn is_hash_approved(&self, owner: Address, digest: &SafeDigest) -> CoordinatorResult<bool> {
        Ok(self.lock()?.approved.contains(&(owner, *digest)))
    }

    fn exec_transaction(&self, tx: &SafeTransaction, signatures: &SignatureBlob) -> CoordinatorResult<ExecutionReceipt> {
        let mut state = self.lock()?;
        let nonce = state.nonce;
        let hash = self.hash_at(tx, nonce);

        if let Err(code) = self.check_signatures(&state, &hash, signatures.as_bytes()) {
            log_debug!("simulated", "execTransaction reverted", reason = code, safe_tx_hash = hash);
            return Err(CoordinatorError::execution_reverted(Some(code.to_string())));
        }

        state.nonce = nonce + U256::one();
        state.executed.push(hash);
        let block_number = state.executed.len() as u64;

        let mut preimage = Vec::with_capacity(64);
        preimage.extend_from_slice(hash.as_bytes());
        let mut nonce_word = [0u8; 32];
        nonce.to_big_endian(&mut nonce_word);
        preimage.extend_from_slice(&nonce_word);

        log_info!("simulated", "execTransaction succeeded", safe_tx_hash = hash, nonce = nonce);

        Ok(ExecutionReceipt {
            transaction_hash: H256::from(keccak256(&preimage)),
            safe_tx_hash: hash,
            nonce,
            success: true,
            block_number: Some(block_number),
            gas_used: None,
        })
    }

    fn threshold(&self) -> CoordinatorResult<u64> {
        Ok(self.threshold)
    }

    fn owners(&self) -> CoordinatorResult<Vec<Address>> {
        Ok(self.owners.iter().copied().collect())
    }

    fn transaction_hash(&self, tx: &SafeTransaction) -> CoordinatorResult<SafeDigest> {
        Ok(digest(self.address, self.chain_id, tx))
    }
}

impl ChainProvider for SimulatedSafe {
    fn chain_id(&self) -> CoordinatorResult<u64> {
        Ok(self.chain_id)
    }
}
