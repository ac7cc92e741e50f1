//! Signature aggregation
//!
//! The Safe walks the blob in 65-byte steps and requires each entry's owner
//! to be strictly greater than the previous one. Sorting by signer address
//! here makes the blob a function of the artifact set alone.

use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::log_debug;
use crate::types::{SignatureArtifact, SignatureBlob, SIGNATURE_LENGTH};
use ethers_core::types::{Address, Bytes};
use std::collections::btree_map::{BTreeMap, Entry};

/// Deduplicate, sort ascending by signer and concatenate.
///
/// Exact duplicates collapse silently. Two different payloads for one signer
/// fail with `DuplicateSigner`. An empty input yields an empty blob.
pub fn aggregate<I>(artifacts: I) -> CoordinatorResult<SignatureBlob>
where
    I: IntoIterator<Item = SignatureArtifact>,
{
    let mut by_signer: BTreeMap<Address, Bytes> = BTreeMap::new();

    for artifact in artifacts {
        if artifact.data.len() != SIGNATURE_LENGTH {
            return Err(CoordinatorError::invalid_input(format!(
                "signature payload must be {} bytes, got {}",
                SIGNATURE_LENGTH,
                artifact.data.len()
            ))
            .with_signer(artifact.signer)
            .with_stage(Stage::Aggregate));
        }

        match by_signer.entry(artifact.signer) {
            Entry::Vacant(slot) => {
                slot.insert(artifact.data);
            }
            Entry::Occupied(existing) => {
                if *existing.get() != artifact.data {
                    return Err(CoordinatorError::duplicate_signer(artifact.signer).with_stage(Stage::Aggregate));
                }
            }
        }
    }

    let mut blob = Vec::with_capacity(by_signer.len() * SIGNATURE_LENGTH);
    for data in by_signer.values() {
        blob.extend_from_slice(data);
    }

    log_debug!(
        "aggregate",
        "signatures aggregated",
        signers = by_signer.len(),
        len = blob.len()
    );

    Ok(SignatureBlob::from_bytes(blob))
}
