//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data.

use crate::error::{CoordinatorError, ErrorCode, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "bytes32")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedDataField {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// Struct name -> ordered field list
pub type TypeMap = BTreeMap<String, Vec<TypedDataField>>;

/// The EIP-712 domain separator data
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Number or decimal/hex string, as wallets send either
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Eip712Domain {
    /// Get the chain ID as a u64
    pub fn chain_id_u64(&self) -> Option<u64> {
        self.chain_id.as_ref().and_then(|v| {
            if let Some(n) = v.as_u64() {
                Some(n)
            } else if let Some(s) = v.as_str() {
                match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex_part) => u64::from_str_radix(hex_part, 16).ok(),
                    None => s.parse().ok(),
                }
            } else {
                None
            }
        })
    }

    /// Domain type fields in canonical order, for the fields that are present
    pub fn type_fields(&self) -> Vec<TypedDataField> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push(TypedDataField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypedDataField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypedDataField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypedDataField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypedDataField::new("salt", "bytes32"));
        }
        fields
    }
}

/// Complete EIP-712 typed data structure (the `eth_signTypedData_v4` payload)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: TypeMap,
    pub primary_type: String,
    pub domain: Eip712Domain,
    pub message: serde_json::Value,
}

impl TypedData {
    /// Parse typed data from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Eip712Error> {
        serde_json::from_str(json).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, Eip712Error> {
        serde_json::to_string(self).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Validate the typed data structure
    pub fn validate(&self) -> Result<(), Eip712Error> {
        if !self.types.contains_key(&self.primary_type) {
            return Err(Eip712Error::InvalidPrimaryType(self.primary_type.clone()));
        }

        for fields in self.types.values() {
            for field in fields {
                self.validate_type(&field.type_name)?;
            }
        }

        Ok(())
    }

    /// Check if a type is valid (either a built-in type or defined in types)
    fn validate_type(&self, type_name: &str) -> Result<(), Eip712Error> {
        let base_type = super::encoder::base_type(type_name);

        if is_atomic_type(base_type) || is_dynamic_type(base_type) || self.types.contains_key(base_type) {
            Ok(())
        } else {
            Err(Eip712Error::InvalidType(type_name.to_string()))
        }
    }
}

/// Errors that can occur during EIP-712 operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid primary type: {0}")]
    InvalidPrimaryType(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for type {type_name}: {value}")]
    InvalidValue { type_name: String, value: String },
}

impl From<Eip712Error> for CoordinatorError {
    fn from(e: Eip712Error) -> Self {
        let code = match e {
            Eip712Error::InvalidJson(_) => ErrorCode::ParseError,
            _ => ErrorCode::InvalidInput,
        };
        CoordinatorError::new(code, e.to_string()).with_stage(Stage::Digest)
    }
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    if type_name == "address" || type_name == "bool" {
        return true;
    }

    let int_bits = type_name
        .strip_prefix("uint")
        .or_else(|| type_name.strip_prefix("int"));
    if let Some(bits) = int_bits {
        return matches!(bits.parse::<u32>(), Ok(n) if n > 0 && n <= 256 && n % 8 == 0);
    }

    if let Some(size) = type_name.strip_prefix("bytes") {
        return matches!(size.parse::<u32>(), Ok(n) if n > 0 && n <= 32);
    }

    false
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_atomic_types() {
        assert!(is_atomic_type("address"));
        assert!(is_atomic_type("bool"));
        assert!(is_atomic_type("uint256"));
        assert!(is_atomic_type("uint8"));
        assert!(is_atomic_type("int256"));
        assert!(is_atomic_type("bytes32"));

        assert!(!is_atomic_type("string"));
        assert!(!is_atomic_type("bytes"));
        assert!(!is_atomic_type("uint"));
        assert!(!is_atomic_type("uint257"));
        assert!(!is_atomic_type("bytes33"));
    }

    #[test]
    fn test_chain_id_forms() {
        let mut domain = Eip712Domain::default();
        domain.chain_id = Some(serde_json::json!(137));
        assert_eq!(domain.chain_id_u64(), Some(137));
        domain.chain_id = Some(serde_json::json!("0x89"));
        assert_eq!(domain.chain_id_u64(), Some(137));
        domain.chain_id = Some(serde_json::json!("137"));
        assert_eq!(domain.chain_id_u64(), Some(137));
    }

    #[test]
    fn test_domain_type_fields_order() {
        let domain = Eip712Domain {
            chain_id: Some(serde_json::json!(1)),
            verifying_contract: Some("0x0000000000000000000000000000000000000001".into()),
            ..Default::default()
        };
        let names: Vec<_> = domain.type_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["chainId", "verifyingContract"]);
    }
}
