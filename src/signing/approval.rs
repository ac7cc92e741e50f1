//! On-chain approval
//!
//! Instead of a signature, the owner records the digest with the Safe's
//! `approveHash`. The entry placed in the blob only names the owner:
//!
//! ```text
//! [ 12 zero bytes | owner (20) ][ 32 zero bytes ][ 0x01 ]
//!          r                            s            v
//! ```

use crate::eip712::SafeTxContext;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::types::{SignatureArtifact, SIGNATURE_LENGTH};
use crate::verifier::SafeVerifier;
use crate::{log_info, log_warn};
use ethers_core::types::Address;

/// Trailing byte the Safe reads as "pre-approved hash"
pub const APPROVED_HASH_MARKER: u8 = 0x01;

/// Placeholder entry for an owner whose approval is recorded on chain
pub fn approval_placeholder(owner: Address) -> [u8; SIGNATURE_LENGTH] {
    let mut entry = [0u8; SIGNATURE_LENGTH];
    entry[12..32].copy_from_slice(owner.as_bytes());
    entry[64] = APPROVED_HASH_MARKER;
    entry
}

/// Record the context digest for `owner` and return the placeholder artifact.
///
/// With `skip_on_chain` set, nothing is sent and the caller vouches that the
/// approval already exists. If it does not, the Safe rejects the aggregate at
/// execution with `GS025`.
pub fn approve_on_chain(
    owner: Address,
    verifier: &dyn SafeVerifier,
    ctx: &SafeTxContext,
    skip_on_chain: bool,
) -> CoordinatorResult<SignatureArtifact> {
    let digest = ctx.digest();

    if verifier.address() != ctx.domain().verifying_contract {
        return Err(CoordinatorError::invalid_input(format!(
            "verifier {:?} does not match the digest domain {:?}",
            verifier.address(),
            ctx.domain().verifying_contract
        ))
        .with_signer(owner)
        .with_stage(Stage::Approve));
    }

    if skip_on_chain {
        log_warn!(
            "approval",
            "on-chain approval skipped, caller vouches it exists",
            owner = owner,
            digest = digest
        );
    } else {
        let tx_hash = verifier
            .approve_hash(owner, &digest)
            .map_err(|e| e.with_signer(owner).with_stage(Stage::Approve))?;
        log_info!(
            "approval",
            "approveHash recorded",
            owner = owner,
            digest = digest,
            tx_hash = tx_hash
        );
    }

    Ok(SignatureArtifact::new(owner, approval_placeholder(owner).to_vec()))
}
