//! Raw-hash signing
//!
//! The signer `personal_sign`s the 32 digest bytes. The Safe verifies such
//! entries as eth_sign signatures, which it recognises by a trailing byte of
//! 31 or 32.

use super::primitive::SigningPrimitive;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::log_debug;
use crate::types::{SafeDigest, SignatureArtifact};

/// Map the primitive's recovery byte onto the Safe's eth_sign range.
///
/// | primitive | entry |
/// |-----------|-------|
/// | 27 or 0   | 31    |
/// | 28 or 1   | 32    |
pub fn remap_recovery_byte(v: u8) -> CoordinatorResult<u8> {
    match v {
        27 | 0 => Ok(31),
        28 | 1 => Ok(32),
        other => Err(CoordinatorError::unsupported_recovery_byte(other)),
    }
}

/// Produce an eth_sign artifact for `digest`
pub fn sign_raw_hash(signer: &dyn SigningPrimitive, digest: &SafeDigest) -> CoordinatorResult<SignatureArtifact> {
    let address = signer.address();
    let fail = |e: CoordinatorError| e.with_signer(address).with_stage(Stage::Sign);

    let mut signature = signer.sign_message(digest.as_bytes()).map_err(fail)?;
    let original = signature[64];
    signature[64] = remap_recovery_byte(original).map_err(fail)?;

    log_debug!(
        "signing",
        "raw-hash signature produced",
        signer = address,
        digest = digest,
        marker = format!("{} -> {}", original, signature[64])
    );

    Ok(SignatureArtifact::new(address, signature.to_vec()))
}
