//! EIP-712 Type Encoding
//!
//! Implements `encodeType`, `typeHash` and `encodeData` for JSON typed data.

use super::types::*;
use crate::utils::crypto::{keccak256, parse_address, parse_u256};
use ethers_core::types::{I256, U256};
use std::collections::BTreeSet;

/// Encode a type string for a struct type.
/// Format: "TypeName(type1 name1,type2 name2,...)" followed by every
/// referenced struct type in alphabetical order.
pub fn encode_type(type_name: &str, types: &TypeMap) -> Result<String, Eip712Error> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;

    let mut result = format_type_string(type_name, fields);

    // BTreeSet keeps the dependencies sorted
    for dep in find_type_dependencies(type_name, types) {
        if dep == type_name {
            continue;
        }
        if let Some(dep_fields) = types.get(&dep) {
            result.push_str(&format_type_string(&dep, dep_fields));
        }
    }

    Ok(result)
}

fn format_type_string(type_name: &str, fields: &[TypedDataField]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();
    format!("{}({})", type_name, field_strs.join(","))
}

/// Find all struct types reachable from `type_name` (including itself)
pub fn find_type_dependencies(type_name: &str, types: &TypeMap) -> BTreeSet<String> {
    let mut dependencies = BTreeSet::new();
    let mut to_visit = vec![type_name.to_string()];

    while let Some(current) = to_visit.pop() {
        if dependencies.contains(&current) {
            continue;
        }
        if let Some(fields) = types.get(&current) {
            dependencies.insert(current.clone());
            for field in fields {
                let base = base_type(&field.type_name);
                if types.contains_key(base) && !dependencies.contains(base) {
                    to_visit.push(base.to_string());
                }
            }
        }
    }

    dependencies
}

/// Strip array suffixes: "Person[]" -> "Person", "uint256[10]" -> "uint256"
pub fn base_type(type_name: &str) -> &str {
    match type_name.find('[') {
        Some(pos) => &type_name[..pos],
        None => type_name,
    }
}

/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(type_name: &str, types: &TypeMap) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_type(type_name, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// Encode one field value into its 32-byte slot in `encodeData`.
///
/// Atomic values are encoded in place; bytes, strings, arrays and structs are
/// replaced by their keccak256 hash.
pub fn encode_field(
    type_name: &str,
    value: &serde_json::Value,
    types: &TypeMap,
) -> Result<[u8; 32], Eip712Error> {
    if let Some(element_type) = array_element_type(type_name) {
        let items = value.as_array().ok_or_else(|| invalid(type_name, value))?;
        let mut encoded = Vec::with_capacity(items.len() * 32);
        for item in items {
            encoded.extend_from_slice(&encode_field(element_type, item, types)?);
        }
        return Ok(keccak256(&encoded));
    }

    if types.contains_key(type_name) {
        return Ok(keccak256(&encode_struct(type_name, value, types)?));
    }

    match type_name {
        "bytes" => {
            let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
            Ok(keccak256(&decode_hex(type_name, raw)?))
        }
        "string" => {
            let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
            Ok(keccak256(raw.as_bytes()))
        }
        _ => encode_atomic(type_name, value),
    }
}

/// `typeHash || encodeData(s)` for a struct value; hashing it gives `hashStruct`
pub fn encode_struct(
    type_name: &str,
    value: &serde_json::Value,
    types: &TypeMap,
) -> Result<Vec<u8>, Eip712Error> {
    let obj = value.as_object().ok_or_else(|| invalid(type_name, value))?;
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&type_hash(type_name, types)?);

    for field in fields {
        let field_value = obj
            .get(&field.name)
            .ok_or_else(|| Eip712Error::MissingField(format!("{}.{}", type_name, field.name)))?;
        encoded.extend_from_slice(&encode_field(&field.type_name, field_value, types)?);
    }

    Ok(encoded)
}

/// "uint256[]" -> Some("uint256"), "Person[3]" -> Some("Person")
fn array_element_type(type_name: &str) -> Option<&str> {
    if !type_name.ends_with(']') {
        return None;
    }
    type_name.rfind('[').map(|pos| &type_name[..pos])
}

/// Encode an atomic (fixed-size) value
fn encode_atomic(type_name: &str, value: &serde_json::Value) -> Result<[u8; 32], Eip712Error> {
    let mut word = [0u8; 32];

    if type_name == "address" {
        let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
        let address = parse_address(raw).map_err(|_| invalid(type_name, value))?;
        word[12..].copy_from_slice(address.as_bytes());
        return Ok(word);
    }

    if type_name == "bool" {
        let b = value.as_bool().ok_or_else(|| invalid(type_name, value))?;
        word[31] = u8::from(b);
        return Ok(word);
    }

    if type_name.starts_with("uint") {
        parse_json_uint(type_name, value)?.to_big_endian(&mut word);
        return Ok(word);
    }

    if type_name.starts_with("int") {
        parse_json_int(type_name, value)?.into_raw().to_big_endian(&mut word);
        return Ok(word);
    }

    if let Some(size) = type_name.strip_prefix("bytes") {
        let size: usize = size
            .parse()
            .map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
        let bytes = decode_hex(type_name, raw)?;
        if bytes.len() > size {
            return Err(Eip712Error::InvalidValue {
                type_name: type_name.to_string(),
                value: format!("{} bytes exceed {}", bytes.len(), size),
            });
        }
        // bytesN is right-padded
        word[..bytes.len()].copy_from_slice(&bytes);
        return Ok(word);
    }

    Err(Eip712Error::InvalidType(type_name.to_string()))
}

fn parse_json_uint(type_name: &str, value: &serde_json::Value) -> Result<U256, Eip712Error> {
    if let Some(n) = value.as_u64() {
        return Ok(U256::from(n));
    }
    let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
    parse_u256(raw).map_err(|_| invalid(type_name, value))
}

fn parse_json_int(type_name: &str, value: &serde_json::Value) -> Result<I256, Eip712Error> {
    if let Some(n) = value.as_i64() {
        return Ok(I256::from(n));
    }
    let raw = value.as_str().ok_or_else(|| invalid(type_name, value))?;
    I256::from_dec_str(raw.trim()).map_err(|_| invalid(type_name, value))
}

fn decode_hex(type_name: &str, raw: &str) -> Result<Vec<u8>, Eip712Error> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(body).map_err(|e| Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: e.to_string(),
    })
}

fn invalid(type_name: &str, value: &serde_json::Value) -> Eip712Error {
    Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    }
}
