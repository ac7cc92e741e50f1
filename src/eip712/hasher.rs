//! EIP-712 Hashing
//!
//! Implements domain separator and struct hashing for EIP-712.

use super::encoder::{encode_field, encode_struct, type_hash};
use super::types::*;
use crate::utils::crypto::keccak256;

/// Magic prefix for EIP-712 encoding
pub const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// domainSeparator = hashStruct(eip712Domain), using only the fields present
pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32], Eip712Error> {
    let fields = domain.type_fields();

    let mut types = TypeMap::new();
    types.insert("EIP712Domain".to_string(), fields.clone());

    let value = serde_json::to_value(domain).map_err(|e| Eip712Error::InvalidJson(e.to_string()))?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&type_hash("EIP712Domain", &types)?);
    for field in &fields {
        let field_value = value
            .get(&field.name)
            .ok_or_else(|| Eip712Error::MissingField(format!("EIP712Domain.{}", field.name)))?;
        encoded.extend_from_slice(&encode_field(&field.type_name, field_value, &types)?);
    }

    Ok(keccak256(&encoded))
}

/// hashStruct(s) = keccak256(typeHash || encodeData(s))
pub fn hash_struct(
    type_name: &str,
    data: &serde_json::Value,
    types: &TypeMap,
) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_struct(type_name, data, types)?;
    Ok(keccak256(&encoded))
}

/// keccak256("\x19\x01" || domainSeparator || structHash)
pub fn eip712_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(EIP712_PREFIX);
    data.extend_from_slice(domain_separator);
    data.extend_from_slice(struct_hash);
    keccak256(&data)
}

/// Calculate the final EIP-712 hash for signing
pub fn hash_typed_data(typed_data: &TypedData) -> Result<[u8; 32], Eip712Error> {
    Ok(get_pre_image(typed_data)?.final_hash)
}

/// Pre-image components (for external signers that want to show them)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip712PreImage {
    pub domain_separator: [u8; 32],
    pub struct_hash: [u8; 32],
    pub final_hash: [u8; 32],
}

/// Calculate the pre-image components for EIP-712
pub fn get_pre_image(typed_data: &TypedData) -> Result<Eip712PreImage, Eip712Error> {
    typed_data.validate()?;

    let domain_separator = domain_separator(&typed_data.domain)?;
    let struct_hash = hash_struct(&typed_data.primary_type, &typed_data.message, &typed_data.types)?;

    Ok(Eip712PreImage {
        domain_separator,
        struct_hash,
        final_hash: eip712_digest(&domain_separator, &struct_hash),
    })
}
