//! Safe transaction and message digests
//!
//! Fixed-schema fast path for the two Safe typed-data structs, plus the
//! JSON typed-data rendering handed to signers that display fields.
//!
//! ```text
//! EIP712Domain(uint256 chainId,address verifyingContract)
//! SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,
//!        uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)
//! SafeMessage(bytes message)
//! ```

use super::hasher::{eip712_digest, hash_typed_data};
use super::types::*;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::types::{SafeDigest, SafeDomain, SafeTransaction};
use crate::utils::crypto::{keccak256, to_checksum_address, to_hex_prefixed};
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

pub const SAFE_MESSAGE_TYPE: &str = "SafeMessage(bytes message)";

pub const SAFE_TX_PRIMARY_TYPE: &str = "SafeTx";

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn uint_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// keccak256(abi.encode(DOMAIN_TYPEHASH, chainId, verifyingContract))
pub fn safe_domain_separator(domain: &SafeDomain) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(96);
    encoded.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&uint_word(&U256::from(domain.chain_id)));
    encoded.extend_from_slice(&address_word(&domain.verifying_contract));
    keccak256(&encoded)
}

/// hashStruct(SafeTx). Every field is encoded, defaults included.
pub fn safe_tx_struct_hash(tx: &SafeTransaction) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(32 * 11);
    encoded.extend_from_slice(&keccak256(SAFE_TX_TYPE.as_bytes()));
    encoded.extend_from_slice(&address_word(&tx.to));
    encoded.extend_from_slice(&uint_word(&tx.value));
    encoded.extend_from_slice(&keccak256(&tx.data));
    encoded.extend_from_slice(&uint_word(&U256::from(u8::from(tx.operation))));
    encoded.extend_from_slice(&uint_word(&tx.safe_tx_gas));
    encoded.extend_from_slice(&uint_word(&tx.base_gas));
    encoded.extend_from_slice(&uint_word(&tx.gas_price));
    encoded.extend_from_slice(&address_word(&tx.gas_token));
    encoded.extend_from_slice(&address_word(&tx.refund_receiver));
    encoded.extend_from_slice(&uint_word(&tx.nonce));
    keccak256(&encoded)
}

/// The digest every signer of `tx` signs or approves
pub fn digest(verifier: Address, chain_id: u64, tx: &SafeTransaction) -> SafeDigest {
    let domain = SafeDomain::new(verifier, chain_id);
    SafeDigest::from_bytes(eip712_digest(&safe_domain_separator(&domain), &safe_tx_struct_hash(tx)))
}

/// Digest of an arbitrary message under the same Safe domain.
///
/// Uses the `SafeMessage` struct, so it can never collide with a `SafeTx`
/// digest for the same Safe and chain.
pub fn digest_for_raw_message(verifier: Address, chain_id: u64, message: &[u8]) -> SafeDigest {
    let domain = SafeDomain::new(verifier, chain_id);

    let mut encoded = Vec::with_capacity(64);
    encoded.extend_from_slice(&keccak256(SAFE_MESSAGE_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(message));
    let struct_hash = keccak256(&encoded);

    SafeDigest::from_bytes(eip712_digest(&safe_domain_separator(&domain), &struct_hash))
}

/// Render `tx` as `eth_signTypedData_v4` typed data
pub fn safe_tx_typed_data(domain: &SafeDomain, tx: &SafeTransaction) -> TypedData {
    let mut types = TypeMap::new();
    types.insert(
        "EIP712Domain".to_string(),
        vec![
            TypedDataField::new("chainId", "uint256"),
            TypedDataField::new("verifyingContract", "address"),
        ],
    );
    types.insert(
        SAFE_TX_PRIMARY_TYPE.to_string(),
        vec![
            TypedDataField::new("to", "address"),
            TypedDataField::new("value", "uint256"),
            TypedDataField::new("data", "bytes"),
            TypedDataField::new("operation", "uint8"),
            TypedDataField::new("safeTxGas", "uint256"),
            TypedDataField::new("baseGas", "uint256"),
            TypedDataField::new("gasPrice", "uint256"),
            TypedDataField::new("gasToken", "address"),
            TypedDataField::new("refundReceiver", "address"),
            TypedDataField::new("nonce", "uint256"),
        ],
    );

    let domain_data = Eip712Domain {
        chain_id: Some(json!(domain.chain_id)),
        verifying_contract: Some(to_checksum_address(domain.verifying_contract.as_bytes())),
        ..Default::default()
    };

    let message = json!({
        "to": to_checksum_address(tx.to.as_bytes()),
        "value": tx.value.to_string(),
        "data": to_hex_prefixed(&tx.data),
        "operation": u8::from(tx.operation),
        "safeTxGas": tx.safe_tx_gas.to_string(),
        "baseGas": tx.base_gas.to_string(),
        "gasPrice": tx.gas_price.to_string(),
        "gasToken": to_checksum_address(tx.gas_token.as_bytes()),
        "refundReceiver": to_checksum_address(tx.refund_receiver.as_bytes()),
        "nonce": tx.nonce.to_string(),
    });

    TypedData {
        types,
        primary_type: SAFE_TX_PRIMARY_TYPE.to_string(),
        domain: domain_data,
        message,
    }
}

/// A transaction bound to its Safe domain, with the digest computed once.
///
/// Every signature producer receives the same context, so every artifact
/// attests to the same digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTxContext {
    domain: SafeDomain,
    transaction: SafeTransaction,
    digest: SafeDigest,
}

impl SafeTxContext {
    pub fn new(domain: SafeDomain, transaction: SafeTransaction) -> Self {
        let digest = digest(domain.verifying_contract, domain.chain_id, &transaction);
        Self {
            domain,
            transaction,
            digest,
        }
    }

    pub fn domain(&self) -> &SafeDomain {
        &self.domain
    }

    pub fn transaction(&self) -> &SafeTransaction {
        &self.transaction
    }

    pub fn digest(&self) -> SafeDigest {
        self.digest
    }

    pub fn typed_data(&self) -> TypedData {
        safe_tx_typed_data(&self.domain, &self.transaction)
    }

    /// Hash the typed-data rendering and check it against the stored digest.
    pub fn checked_typed_data(&self) -> CoordinatorResult<TypedData> {
        let typed = self.typed_data();
        let hashed = SafeDigest::from_bytes(hash_typed_data(&typed)?);
        if hashed != self.digest {
            return Err(CoordinatorError::digest_mismatch(format!(
                "typed data hashes to {} but context digest is {}",
                hashed, self.digest
            ))
            .with_stage(Stage::Digest));
        }
        Ok(typed)
    }
}
