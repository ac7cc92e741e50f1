//! Crypto and parsing helpers
//!
//! Keccak hashing, EIP-55 checksums and the strict string parsers used by the
//! builder, the CLI and the configuration loader.

use crate::error::{CoordinatorError, CoordinatorResult};
use ethers_core::types::{Address, Bytes, U256};
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed Ethereum address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() || nibble < 8 {
            result.push(ch);
        } else {
            result.push(ch.to_ascii_uppercase());
        }
    }

    result
}

/// Parse a `0x`-prefixed 20-byte hex address.
///
/// Mixed-case input must carry a valid EIP-55 checksum; all-lowercase and
/// all-uppercase input is accepted as is.
pub fn parse_address(input: &str) -> CoordinatorResult<Address> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| CoordinatorError::invalid_input(format!("address must start with 0x: {:?}", input)))?;

    if body.len() != 40 {
        return Err(CoordinatorError::invalid_input(format!(
            "address must be 20 bytes, got {} hex chars",
            body.len()
        )));
    }

    let bytes = hex::decode(body)
        .map_err(|e| CoordinatorError::invalid_input(format!("invalid address {:?}: {}", input, e)))?;

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(&bytes)[2..] != *body {
        return Err(CoordinatorError::invalid_input(format!(
            "address checksum mismatch: {}",
            input
        )));
    }

    Ok(Address::from_slice(&bytes))
}

/// Parse an unsigned integer given in decimal or `0x` hex.
///
/// Negative and fractional values are rejected.
pub fn parse_u256(input: &str) -> CoordinatorResult<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoordinatorError::invalid_input("empty integer"));
    }
    if trimmed.starts_with('-') {
        return Err(CoordinatorError::invalid_input(format!("negative value: {}", trimmed)));
    }

    if let Some(hex_part) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if hex_part.is_empty() {
            return Ok(U256::zero());
        }
        U256::from_str_radix(hex_part, 16)
            .map_err(|e| CoordinatorError::invalid_input(format!("invalid hex integer {}: {}", trimmed, e)))
    } else {
        U256::from_dec_str(trimmed)
            .map_err(|e| CoordinatorError::invalid_input(format!("invalid integer {}: {:?}", trimmed, e)))
    }
}

/// Parse hex bytes, with or without `0x`. Empty input and `0x` map to no bytes.
pub fn parse_hex_bytes(input: &str) -> CoordinatorResult<Bytes> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(body)?;
    Ok(Bytes::from(bytes))
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
