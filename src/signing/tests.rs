//! Signature producer tests

use super::*;
use crate::error::{ErrorCode, Stage};
use crate::types::{SafeDigest, SafeDomain, SafeTransaction, SignatureKind, SIGNATURE_LENGTH};
use crate::verifier::{SafeVerifier, SimulatedSafe};
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_signers::LocalWallet;

const KEY_A: &str = "0xac0974bec39a17e36ba4a4b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

fn wallet(key: &str) -> LocalWallet {
    wallet_from_hex(key).unwrap()
}

fn safe_address() -> Address {
    Address::repeat_byte(0x5a)
}

fn context() -> SafeTxContext {
    let mut tx = SafeTransaction::new(Address::repeat_byte(0xaa), U256::from(5));
    tx.data = Bytes::from(vec![0xab, 0xcd]);
    SafeTxContext::new(SafeDomain::new(safe_address(), 1), tx)
}

/// Wraps a wallet and rewrites the recovery byte it reports
struct FixedMarker {
    inner: LocalWallet,
    marker: fn(u8) -> u8,
}

impl SigningPrimitive for FixedMarker {
    fn address(&self) -> Address {
        SigningPrimitive::address(&self.inner)
    }

    fn sign_digest(&self, hash: H256) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        let mut sig = self.inner.sign_digest(hash)?;
        sig[64] = (self.marker)(sig[64]);
        Ok(sig)
    }
}

/// Signs whatever it is given, but always over the wrong document
struct WrongDocument(LocalWallet);

impl SigningPrimitive for WrongDocument {
    fn address(&self) -> Address {
        SigningPrimitive::address(&self.0)
    }

    fn sign_digest(&self, hash: H256) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        self.0.sign_digest(hash)
    }

    fn sign_typed_data(&self, _typed_data: &crate::eip712::TypedData) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        self.0.sign_digest(H256::repeat_byte(0xee))
    }
}

#[test]
fn test_remap_table() {
    assert_eq!(remap_recovery_byte(27).unwrap(), 31);
    assert_eq!(remap_recovery_byte(0).unwrap(), 31);
    assert_eq!(remap_recovery_byte(28).unwrap(), 32);
    assert_eq!(remap_recovery_byte(1).unwrap(), 32);
    for v in [2u8, 26, 29, 31, 32, 35, 255] {
        let err = remap_recovery_byte(v).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedRecoveryByte);
    }
}

#[test]
fn test_normalize_table() {
    assert_eq!(normalize_recovery_byte(27).unwrap(), 27);
    assert_eq!(normalize_recovery_byte(28).unwrap(), 28);
    assert_eq!(normalize_recovery_byte(0).unwrap(), 27);
    assert_eq!(normalize_recovery_byte(1).unwrap(), 28);
    assert!(normalize_recovery_byte(31).is_err());
}

#[test]
fn test_raw_hash_artifact_recovers() {
    let ctx = context();
    let signer = wallet(KEY_A);
    let artifact = sign_raw_hash(&signer, &ctx.digest()).unwrap();

    assert_eq!(artifact.data.len(), 65);
    assert_eq!(artifact.kind(), Some(SignatureKind::EthSign));
    assert_eq!(artifact.signer, SigningPrimitive::address(&signer));
    artifact.verify(&ctx.digest()).unwrap();
}

#[test]
fn test_raw_hash_accepts_zero_based_recovery() {
    let ctx = context();
    let signer = FixedMarker {
        inner: wallet(KEY_A),
        marker: |v| v - 27,
    };
    let artifact = sign_raw_hash(&signer, &ctx.digest()).unwrap();
    assert!(matches!(artifact.marker(), Some(31) | Some(32)));
    artifact.verify(&ctx.digest()).unwrap();
}

#[test]
fn test_raw_hash_rejects_other_markers() {
    let ctx = context();
    let signer = FixedMarker {
        inner: wallet(KEY_A),
        marker: |_| 37,
    };
    let err = sign_raw_hash(&signer, &ctx.digest()).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedRecoveryByte);
    assert_eq!(err.signer, Some(signer.address()));
    assert_eq!(err.stage, Some(Stage::Sign));
}

#[test]
fn test_structured_artifact_recovers_over_digest() {
    let ctx = context();
    let signer = wallet(KEY_B);
    let artifact = sign_structured(&signer, &ctx).unwrap();

    assert_eq!(artifact.kind(), Some(SignatureKind::Ecdsa));
    assert_eq!(
        recover_signer(&ctx.digest(), &artifact.data).unwrap(),
        SigningPrimitive::address(&signer)
    );
}

#[test]
fn test_structured_normalizes_zero_based_recovery() {
    let ctx = context();
    let signer = FixedMarker {
        inner: wallet(KEY_B),
        marker: |v| v - 27,
    };
    let artifact = sign_structured(&signer, &ctx).unwrap();
    assert!(matches!(artifact.marker(), Some(27) | Some(28)));
}

#[test]
fn test_structured_detects_wrong_document() {
    let ctx = context();
    let signer = WrongDocument(wallet(KEY_B));
    let err = sign_structured(&signer, &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::DigestMismatch);
    assert_eq!(err.stage, Some(Stage::Sign));
}

#[test]
fn test_all_methods_attest_to_one_digest() {
    let ctx = context();
    let a = wallet(KEY_A);
    let b = wallet(KEY_B);
    let safe = SimulatedSafe::new(
        safe_address(),
        1,
        vec![SigningPrimitive::address(&a), SigningPrimitive::address(&b), Address::repeat_byte(0x03)],
        2,
    )
    .unwrap();

    let structured = SignatureMethod::Structured.produce(&a, &ctx, &safe).unwrap();
    let raw = SignatureMethod::RawHash.produce(&b, &ctx, &safe).unwrap();
    for artifact in [&structured, &raw] {
        artifact.verify(&ctx.digest()).unwrap();
    }

    let other = SafeDigest::from_bytes([0x42; 32]);
    assert!(structured.verify(&other).is_err());
    assert!(raw.verify(&other).is_err());
}

#[test]
fn test_approval_records_and_returns_placeholder() {
    let ctx = context();
    let owner = wallet(KEY_A);
    let owner_address = SigningPrimitive::address(&owner);
    let safe = SimulatedSafe::new(safe_address(), 1, vec![owner_address], 1).unwrap();

    let artifact = SignatureMethod::OnChainApproval { skip_on_chain: false }
        .produce(&owner, &ctx, &safe)
        .unwrap();

    assert_eq!(artifact.data.to_vec(), approval_placeholder(owner_address).to_vec());
    assert_eq!(artifact.kind(), Some(SignatureKind::ApprovedHash));
    assert!(safe.is_hash_approved(owner_address, &ctx.digest()).unwrap());
    artifact.verify(&ctx.digest()).unwrap();
}

#[test]
fn test_skipped_approval_sends_nothing() {
    let ctx = context();
    let owner = Address::repeat_byte(0x01);
    let safe = SimulatedSafe::new(safe_address(), 1, vec![owner], 1).unwrap();

    let artifact = approve_on_chain(owner, &safe, &ctx, true).unwrap();
    assert_eq!(artifact.marker(), Some(0x01));
    assert!(!safe.is_hash_approved(owner, &ctx.digest()).unwrap());
}

#[test]
fn test_approval_by_non_owner_rejected() {
    let ctx = context();
    let safe = SimulatedSafe::new(safe_address(), 1, vec![Address::repeat_byte(0x01)], 1).unwrap();
    let stranger = Address::repeat_byte(0x09);

    let err = approve_on_chain(stranger, &safe, &ctx, false).unwrap_err();
    assert_eq!(err.code, ErrorCode::ApprovalRejected);
    assert_eq!(err.signer, Some(stranger));
    assert_eq!(err.stage, Some(Stage::Approve));
}

#[test]
fn test_approval_against_other_safe_rejected() {
    let ctx = context();
    let owner = Address::repeat_byte(0x01);
    let other_safe = SimulatedSafe::new(Address::repeat_byte(0x5b), 1, vec![owner], 1).unwrap();

    let err = approve_on_chain(owner, &other_safe, &ctx, false).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert!(!other_safe.is_hash_approved(owner, &ctx.digest()).unwrap());
}

#[test]
fn test_method_from_str() {
    assert_eq!("structured".parse::<SignatureMethod>().unwrap(), SignatureMethod::Structured);
    assert_eq!("raw-hash".parse::<SignatureMethod>().unwrap(), SignatureMethod::RawHash);
    assert_eq!(
        "approve-skip".parse::<SignatureMethod>().unwrap(),
        SignatureMethod::OnChainApproval { skip_on_chain: true }
    );
    assert!("carrier-pigeon".parse::<SignatureMethod>().is_err());

    let json = serde_json::to_string(&SignatureMethod::OnChainApproval { skip_on_chain: true }).unwrap();
    assert_eq!(json, r#"{"method":"on_chain_approval","skip_on_chain":true}"#);
}
