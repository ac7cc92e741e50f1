//! Structured (EIP-712) signing
//!
//! The signer sees the full `SafeTx` typed data. Its hash is checked against
//! the context digest before anything is signed.

use super::primitive::SigningPrimitive;
use crate::eip712::SafeTxContext;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::log_debug;
use crate::types::SignatureArtifact;

/// Bring a structured signature's recovery byte into the range the Safe
/// treats as plain ECDSA. 0 and 1 would otherwise be read as contract and
/// approved-hash entries.
pub fn normalize_recovery_byte(v: u8) -> CoordinatorResult<u8> {
    match v {
        27 | 28 => Ok(v),
        0 | 1 => Ok(v + 27),
        other => Err(CoordinatorError::unsupported_recovery_byte(other)),
    }
}

/// Produce an EIP-712 artifact for the context's transaction
pub fn sign_structured(signer: &dyn SigningPrimitive, ctx: &SafeTxContext) -> CoordinatorResult<SignatureArtifact> {
    let address = signer.address();
    let fail = |e: CoordinatorError| e.with_signer(address).with_stage(Stage::Sign);

    let typed_data = ctx.checked_typed_data().map_err(fail)?;
    let mut signature = signer.sign_typed_data(&typed_data).map_err(fail)?;
    signature[64] = normalize_recovery_byte(signature[64]).map_err(fail)?;

    let artifact = SignatureArtifact::new(address, signature.to_vec());
    // Remote signers hash the document themselves
    artifact.verify(&ctx.digest()).map_err(fail)?;

    log_debug!(
        "signing",
        "structured signature produced",
        signer = address,
        digest = ctx.digest()
    );

    Ok(artifact)
}
