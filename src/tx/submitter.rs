//! Execution submitter
//!
//! Hands the record and the aggregated blob to `execTransaction`. Failures
//! come back as they are; nothing is retried, since a reverted submission
//! may already have consumed gas.

use crate::eip712::SafeTxContext;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::types::{ExecutionReceipt, SafeTransaction, SignatureBlob};
use crate::verifier::SafeVerifier;
use crate::{log_error, log_info, log_warn};

/// Submit `tx` with `blob` to the verifier.
///
/// A mined transaction whose inner call failed still returns a receipt, with
/// `success` unset; see [`ExecutionReceipt::ensure_success`].
pub fn submit(verifier: &dyn SafeVerifier, tx: &SafeTransaction, blob: &SignatureBlob) -> CoordinatorResult<ExecutionReceipt> {
    log_info!(
        "submit",
        "submitting execTransaction",
        safe = verifier.address(),
        nonce = tx.nonce,
        entries = blob.signature_count()
    );

    match verifier.exec_transaction(tx, blob) {
        Ok(receipt) if !receipt.success => {
            log_warn!(
                "submit",
                "execTransaction mined but the Safe reported ExecutionFailure",
                tx_hash = receipt.transaction_hash,
                safe_tx_hash = receipt.safe_tx_hash,
                nonce = receipt.nonce
            );
            Ok(receipt)
        }
        Ok(receipt) => {
            log_info!(
                "submit",
                "execution confirmed",
                tx_hash = receipt.transaction_hash,
                safe_tx_hash = receipt.safe_tx_hash,
                success = receipt.success
            );
            Ok(receipt)
        }
        Err(e) => {
            log_error!("submit", "execution failed", error = e.to_string());
            Err(e.with_stage(Stage::Submit))
        }
    }
}

/// Compare the context digest with the Safe's own `getTransactionHash`.
///
/// Catches a wrong chain id or Safe address before anyone signs.
pub fn verify_digest_onchain(verifier: &dyn SafeVerifier, ctx: &SafeTxContext) -> CoordinatorResult<()> {
    if verifier.address() != ctx.domain().verifying_contract {
        return Err(CoordinatorError::invalid_input(format!(
            "verifier {:?} is not the digest's Safe {:?}",
            verifier.address(),
            ctx.domain().verifying_contract
        ))
        .with_stage(Stage::Digest));
    }

    let onchain = verifier
        .transaction_hash(ctx.transaction())
        .map_err(|e| e.with_stage(Stage::Digest))?;
    if onchain != ctx.digest() {
        return Err(CoordinatorError::digest_mismatch(format!(
            "local digest {} differs from the Safe's {}",
            ctx.digest(),
            onchain
        ))
        .with_stage(Stage::Digest));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::SafeDomain;
    use crate::verifier::SimulatedSafe;
    use ethers_core::types::{Address, U256};

    fn safe() -> SimulatedSafe {
        SimulatedSafe::new(Address::repeat_byte(0x5a), 1, vec![Address::repeat_byte(1)], 1).unwrap()
    }

    #[test]
    fn test_verify_digest_onchain() {
        let tx = SafeTransaction::new(Address::repeat_byte(0xaa), U256::zero());

        let ctx = SafeTxContext::new(SafeDomain::new(Address::repeat_byte(0x5a), 1), tx.clone());
        assert!(verify_digest_onchain(&safe(), &ctx).is_ok());

        let wrong_chain = SafeTxContext::new(SafeDomain::new(Address::repeat_byte(0x5a), 5), tx.clone());
        let err = verify_digest_onchain(&safe(), &wrong_chain).unwrap_err();
        assert_eq!(err.code, ErrorCode::DigestMismatch);

        let wrong_safe = SafeTxContext::new(SafeDomain::new(Address::repeat_byte(0x5b), 1), tx);
        let err = verify_digest_onchain(&safe(), &wrong_safe).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_submit_reports_stage() {
        let tx = SafeTransaction::new(Address::repeat_byte(0xaa), U256::zero());
        let err = submit(&safe(), &tx, &SignatureBlob::from_bytes(Vec::<u8>::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionReverted);
        assert_eq!(err.stage, Some(Stage::Submit));
        assert_eq!(err.revert_reason(), Some("GS020"));
    }
}
