//! Signature recovery
//!
//! Derives the owner each 65-byte entry speaks for, following the Safe's
//! `checkNSignatures` rules for the trailing byte.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::types::{SafeDigest, SignatureArtifact, SignatureKind, SIGNATURE_LENGTH};
use crate::utils::crypto::keccak256;
use ethers_core::types::Address;
use ethers_core::utils::hash_message;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};

/// Recover the address that signed `hash` from a compact `r || s` and a
/// recovery id in 0..=3
pub fn ecrecover(hash: &[u8; 32], rs: &[u8], recovery_id: u8) -> CoordinatorResult<Address> {
    if rs.len() != 64 {
        return Err(CoordinatorError::invalid_input(format!(
            "expected 64 signature bytes, got {}",
            rs.len()
        )));
    }

    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(hash)?;
    let rec_id = RecoveryId::from_i32(i32::from(recovery_id))?;
    let signature = RecoverableSignature::from_compact(rs, rec_id)?;
    let public_key = secp.recover_ecdsa(&msg, &signature)?;

    // Skip the 0x04 prefix of the uncompressed key
    let hash = keccak256(&public_key.serialize_uncompressed()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Owner an entry claims to speak for under `digest`.
///
/// ECDSA entries (v = 27/28) recover over the digest itself, eth_sign entries
/// (v = 31/32) over its EIP-191 prefixed hash. Approved-hash and contract
/// entries carry the owner in their first word, so no cryptography is
/// involved for them.
pub fn recover_signer(digest: &SafeDigest, entry: &[u8]) -> CoordinatorResult<Address> {
    if entry.len() != SIGNATURE_LENGTH {
        return Err(CoordinatorError::invalid_input(format!(
            "signature entry must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            entry.len()
        )));
    }

    let v = entry[64];
    match SignatureKind::from_marker(v) {
        SignatureKind::Contract | SignatureKind::ApprovedHash => Ok(Address::from_slice(&entry[12..32])),
        SignatureKind::Ecdsa => ecrecover(digest.as_bytes(), &entry[..64], v - 27),
        SignatureKind::EthSign => {
            let prefixed = hash_message(digest.as_bytes());
            ecrecover(prefixed.as_fixed_bytes(), &entry[..64], v - 31)
        }
        SignatureKind::Unknown(other) => Err(CoordinatorError::unsupported_recovery_byte(other)),
    }
}

impl SignatureArtifact {
    /// Check that this artifact attests to `digest` for its own signer.
    ///
    /// Approved-hash placeholders are checked for layout only; whether the
    /// approval exists is known to the verifier alone.
    pub fn verify(&self, digest: &SafeDigest) -> CoordinatorResult<()> {
        if let Some(SignatureKind::ApprovedHash) = self.kind() {
            if self.data.len() != SIGNATURE_LENGTH || self.data[..12] != [0u8; 12] || self.data[32..64] != [0u8; 32] {
                return Err(CoordinatorError::invalid_input("malformed approval placeholder").with_signer(self.signer));
            }
        }

        let recovered = recover_signer(digest, &self.data).map_err(|e| e.with_signer(self.signer))?;
        if recovered != self.signer {
            return Err(CoordinatorError::digest_mismatch(format!(
                "signature recovers to {:?}, not to its signer, under digest {}",
                recovered, digest
            ))
            .with_signer(self.signer));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_hash_entry_reads_owner() {
        let owner = Address::repeat_byte(0x42);
        let mut entry = [0u8; 65];
        entry[12..32].copy_from_slice(owner.as_bytes());
        entry[64] = 1;

        let digest = SafeDigest::from_bytes([9u8; 32]);
        assert_eq!(recover_signer(&digest, &entry).unwrap(), owner);
    }

    #[test]
    fn test_unknown_marker_rejected() {
        let mut entry = [0u8; 65];
        entry[64] = 29;
        let err = recover_signer(&SafeDigest::from_bytes([1u8; 32]), &entry).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedRecoveryByte);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = recover_signer(&SafeDigest::from_bytes([1u8; 32]), &[0u8; 64]).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_ecrecover_rejects_bad_recovery_id() {
        assert!(ecrecover(&[1u8; 32], &[1u8; 64], 4).is_err());
    }
}
