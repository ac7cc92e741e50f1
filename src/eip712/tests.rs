//! EIP-712 Test Suite
//!
//! Generic typed-data vectors plus the Safe transaction and message digests.

use super::*;
use crate::types::{Operation, SafeDomain, SafeTransaction};
use ethers_core::types::{Address, Bytes, U256};

/// Test the canonical Mail example from EIP-712 specification
#[test]
fn test_eip712_mail_example() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"}
            ],
            "Person": [
                {"name": "name", "type": "string"},
                {"name": "wallet", "type": "address"}
            ],
            "Mail": [
                {"name": "from", "type": "Person"},
                {"name": "to", "type": "Person"},
                {"name": "contents", "type": "string"}
            ]
        },
        "primaryType": "Mail",
        "domain": {
            "name": "Ether Mail",
            "version": "1",
            "chainId": 1,
            "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
        },
        "message": {
            "from": {
                "name": "Cow",
                "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
            },
            "to": {
                "name": "Bob",
                "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"
            },
            "contents": "Hello, Bob!"
        }
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    let pre_image = get_pre_image(&typed_data).unwrap();

    assert_eq!(
        hex::encode(pre_image.domain_separator),
        "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
    );
    assert_eq!(
        hex::encode(pre_image.struct_hash),
        "c52c0ee5d84264471806290a3f2c4cecfc5490626bf912d01f240d7a274b371e"
    );
    assert_eq!(
        hex::encode(pre_image.final_hash),
        "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
    );
}

/// Test with nested struct arrays
#[test]
fn test_eip712_struct_arrays() {
    let json = r#"{
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "chainId", "type": "uint256"}
            ],
            "Item": [
                {"name": "id", "type": "uint256"},
                {"name": "name", "type": "string"}
            ],
            "Order": [
                {"name": "items", "type": "Item[]"},
                {"name": "buyer", "type": "address"}
            ]
        },
        "primaryType": "Order",
        "domain": {
            "name": "Marketplace",
            "chainId": 1
        },
        "message": {
            "items": [
                {"id": 1, "name": "Widget"},
                {"id": 2, "name": "Gadget"}
            ],
            "buyer": "0x1234567890123456789012345678901234567890"
        }
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    typed_data.validate().unwrap();

    let first = hash_typed_data(&typed_data).unwrap();

    let mut reordered = typed_data.clone();
    reordered.message["items"] = serde_json::json!([
        {"id": 2, "name": "Gadget"},
        {"id": 1, "name": "Widget"}
    ]);
    assert_ne!(first, hash_typed_data(&reordered).unwrap());
}

#[test]
fn test_invalid_primary_type() {
    let json = r#"{
        "types": {
            "EIP712Domain": [{"name": "chainId", "type": "uint256"}]
        },
        "primaryType": "Missing",
        "domain": {"chainId": 1},
        "message": {}
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    assert!(matches!(
        hash_typed_data(&typed_data),
        Err(Eip712Error::InvalidPrimaryType(_))
    ));
}

#[test]
fn test_unknown_field_type() {
    let json = r#"{
        "types": {
            "EIP712Domain": [{"name": "chainId", "type": "uint256"}],
            "Thing": [{"name": "x", "type": "uint7"}]
        },
        "primaryType": "Thing",
        "domain": {"chainId": 1},
        "message": {"x": 1}
    }"#;

    let typed_data = TypedData::from_json(json).unwrap();
    assert!(matches!(typed_data.validate(), Err(Eip712Error::InvalidType(_))));
}

// =============================================================================
// Safe schema
// =============================================================================

fn safe_address() -> Address {
    Address::repeat_byte(0x5a)
}

fn sample_tx() -> SafeTransaction {
    let mut tx = SafeTransaction::new(Address::repeat_byte(0xaa), U256::from(5));
    tx.data = Bytes::from(vec![0xab, 0xcd]);
    tx
}

#[test]
fn test_safe_typehashes() {
    assert_eq!(
        hex::encode(crate::utils::keccak256(DOMAIN_TYPE.as_bytes())),
        "47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218"
    );
    assert_eq!(
        hex::encode(crate::utils::keccak256(SAFE_TX_TYPE.as_bytes())),
        "bb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8"
    );
    assert_eq!(
        hex::encode(crate::utils::keccak256(SAFE_MESSAGE_TYPE.as_bytes())),
        "60b3cbf8b4a223d68d641b3b6ddf9a298e7f33710cf3d3a9d1146b5a6150fbca"
    );
}

#[test]
fn test_safe_tx_type_matches_generic_encoder() {
    let typed = safe_tx_typed_data(&SafeDomain::new(safe_address(), 1), &sample_tx());
    assert_eq!(encode_type(SAFE_TX_PRIMARY_TYPE, &typed.types).unwrap(), SAFE_TX_TYPE);
    assert_eq!(encode_type("EIP712Domain", &typed.types).unwrap(), DOMAIN_TYPE);
}

#[test]
fn test_digest_is_deterministic() {
    let a = digest(safe_address(), 1, &sample_tx());
    let b = digest(safe_address(), 1, &sample_tx().clone());
    assert_eq!(a, b);
}

#[test]
fn test_digest_depends_on_chain_and_verifier() {
    let tx = sample_tx();
    let mainnet = digest(safe_address(), 1, &tx);
    assert_ne!(mainnet, digest(safe_address(), 137, &tx));
    assert_ne!(mainnet, digest(Address::repeat_byte(0x5b), 1, &tx));
}

#[test]
fn test_every_field_changes_digest() {
    let base = sample_tx();
    let reference = digest(safe_address(), 1, &base);

    let mut variants = Vec::new();

    let mut tx = base.clone();
    tx.to = Address::repeat_byte(0xab);
    variants.push(("to", tx));

    let mut tx = base.clone();
    tx.value = U256::from(1);
    variants.push(("value", tx));

    let mut tx = base.clone();
    tx.data = Bytes::from(vec![0xab, 0xce]);
    variants.push(("data", tx));

    let mut tx = base.clone();
    tx.operation = Operation::DelegateCall;
    variants.push(("operation", tx));

    let mut tx = base.clone();
    tx.safe_tx_gas = U256::from(1);
    variants.push(("safe_tx_gas", tx));

    let mut tx = base.clone();
    tx.base_gas = U256::from(1);
    variants.push(("base_gas", tx));

    let mut tx = base.clone();
    tx.gas_price = U256::from(1);
    variants.push(("gas_price", tx));

    let mut tx = base.clone();
    tx.gas_token = Address::repeat_byte(1);
    variants.push(("gas_token", tx));

    let mut tx = base.clone();
    tx.refund_receiver = Address::repeat_byte(1);
    variants.push(("refund_receiver", tx));

    let mut tx = base.clone();
    tx.nonce = U256::from(6);
    variants.push(("nonce", tx));

    for (field, tx) in variants {
        assert_ne!(reference, digest(safe_address(), 1, &tx), "{} did not affect the digest", field);
    }
}

#[test]
fn test_empty_data_is_hashed_not_skipped() {
    let mut empty = sample_tx();
    empty.data = Bytes::default();
    let mut zero_byte = sample_tx();
    zero_byte.data = Bytes::from(vec![0u8]);
    assert_ne!(digest(safe_address(), 1, &empty), digest(safe_address(), 1, &zero_byte));
}

#[test]
fn test_typed_data_path_matches_fast_path() {
    let domain = SafeDomain::new(safe_address(), 31337);
    let mut tx = sample_tx();
    tx.value = U256::exp10(18);
    tx.operation = Operation::DelegateCall;
    tx.gas_price = U256::from(7);
    tx.refund_receiver = Address::repeat_byte(0x11);

    let typed = safe_tx_typed_data(&domain, &tx);
    let generic = hash_typed_data(&typed).unwrap();
    assert_eq!(generic, *digest(safe_address(), 31337, &tx).as_bytes());
}

#[test]
fn test_typed_data_survives_json_round_trip() {
    let ctx = SafeTxContext::new(SafeDomain::new(safe_address(), 1), sample_tx());
    let json = ctx.typed_data().to_json().unwrap();
    let parsed = TypedData::from_json(&json).unwrap();
    assert_eq!(hash_typed_data(&parsed).unwrap(), *ctx.digest().as_bytes());
}

#[test]
fn test_context_digest_and_checked_typed_data() {
    let ctx = SafeTxContext::new(SafeDomain::new(safe_address(), 1), sample_tx());
    assert_eq!(ctx.digest(), digest(safe_address(), 1, &sample_tx()));
    assert_eq!(ctx.domain().chain_id, 1);
    assert_eq!(ctx.transaction().nonce, U256::from(5));
    assert!(ctx.checked_typed_data().is_ok());
}

#[test]
fn test_message_digest_differs_from_tx_digest() {
    let tx = sample_tx();
    let tx_digest = digest(safe_address(), 1, &tx);
    let msg_digest = digest_for_raw_message(safe_address(), 1, &tx.data);
    assert_ne!(tx_digest, msg_digest);

    assert_eq!(msg_digest, digest_for_raw_message(safe_address(), 1, &[0xab, 0xcd]));
    assert_ne!(msg_digest, digest_for_raw_message(safe_address(), 5, &[0xab, 0xcd]));
}
