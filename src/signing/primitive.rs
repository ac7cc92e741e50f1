//! Signing primitives
//!
//! The coordinator never holds key material itself. Whatever produces
//! signatures (a local key, a hardware device bridge, a remote signer) is
//! reached through [`SigningPrimitive`].

use crate::eip712::{hash_typed_data, TypedData};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::types::SIGNATURE_LENGTH;
use ethers_core::types::{Address, Signature, H256};
use ethers_core::utils::hash_message;
use ethers_signers::{LocalWallet, Signer};
use std::str::FromStr;
use zeroize::Zeroizing;

/// A party able to produce secp256k1 signatures for one address.
///
/// Implementations are called from blocking worker threads, so they may do
/// blocking I/O but must be `Send + Sync`.
pub trait SigningPrimitive: Send + Sync {
    /// Address the produced signatures recover to
    fn address(&self) -> Address;

    /// Sign `hash` as is, no prefix. Returns `r || s || v`.
    fn sign_digest(&self, hash: H256) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]>;

    /// EIP-191 `personal_sign` over `message`
    fn sign_message(&self, message: &[u8]) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        self.sign_digest(hash_message(message))
    }

    /// `eth_signTypedData_v4` over a typed-data document
    fn sign_typed_data(&self, typed_data: &TypedData) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        let hash = hash_typed_data(typed_data)?;
        self.sign_digest(H256::from(hash))
    }
}

impl SigningPrimitive for LocalWallet {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    fn sign_digest(&self, hash: H256) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        let signature = self.sign_hash(hash)?;
        signature_bytes(&signature)
    }
}

impl<T: SigningPrimitive + ?Sized> SigningPrimitive for std::sync::Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_digest(&self, hash: H256) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        (**self).sign_digest(hash)
    }

    fn sign_message(&self, message: &[u8]) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        (**self).sign_message(message)
    }

    fn sign_typed_data(&self, typed_data: &TypedData) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
        (**self).sign_typed_data(typed_data)
    }
}

/// Serialize an ethers signature as `r || s || v` with a one-byte `v`
pub fn signature_bytes(signature: &Signature) -> CoordinatorResult<[u8; SIGNATURE_LENGTH]> {
    let v = u8::try_from(signature.v).map_err(|_| {
        CoordinatorError::signing_failed(format!("recovery value {} does not fit in one byte", signature.v))
    })?;

    let mut out = [0u8; SIGNATURE_LENGTH];
    signature.r.to_big_endian(&mut out[..32]);
    signature.s.to_big_endian(&mut out[32..64]);
    out[64] = v;
    Ok(out)
}

/// Load a local signing key from hex (with or without `0x`).
///
/// The intermediate string is wiped on drop.
pub fn wallet_from_hex(key_hex: &str) -> CoordinatorResult<LocalWallet> {
    let trimmed = Zeroizing::new(
        key_hex
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X")
            .to_string(),
    );
    if trimmed.len() != 64 {
        return Err(CoordinatorError::invalid_input(format!(
            "private key must be 32 bytes, got {} hex chars",
            trimmed.len()
        )));
    }
    LocalWallet::from_str(&trimmed)
        .map_err(|e| CoordinatorError::invalid_input(format!("invalid private key: {}", e)))
}
