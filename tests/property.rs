use ethers_core::types::{Address, Bytes, U256};
use proptest::prelude::*;
use safe_coordinator::eip712::hash_typed_data;
use safe_coordinator::signing::remap_recovery_byte;
use safe_coordinator::utils::crypto::parse_address;
use safe_coordinator::{
    aggregate, digest, keccak256, to_checksum_address, SafeDomain, SafeTransaction, SafeTxContext,
    SignatureArtifact,
};

fn any_tx() -> impl Strategy<Value = SafeTransaction> {
    (
        prop::array::uniform20(any::<u8>()),
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 0..96),
        0u64..1_000_000,
    )
        .prop_map(|(to, value, data, nonce)| {
            let mut tx = SafeTransaction::new(Address::from(to), U256::from(nonce));
            tx.value = U256::from(value);
            tx.data = Bytes::from(data);
            tx
        })
}

/// Distinct signers with dummy ECDSA-shaped payloads, plus a shuffled copy
fn artifact_sets() -> impl Strategy<Value = (Vec<SignatureArtifact>, Vec<SignatureArtifact>)> {
    prop::collection::btree_map(prop::array::uniform20(any::<u8>()), any::<u8>(), 1..6)
        .prop_map(|signers| {
            signers
                .into_iter()
                .map(|(address, fill)| {
                    let mut data = vec![fill; 65];
                    data[64] = 27;
                    SignatureArtifact::new(Address::from(address), data)
                })
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|sorted| (Just(sorted.clone()), Just(sorted).prop_shuffle()))
}

proptest! {
    #[test]
    fn checksum_addresses_roundtrip(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let lower_expected = hex::encode(bytes);
        let tail = checksummed.trim_start_matches("0x");
        prop_assert_eq!(tail.to_ascii_lowercase(), lower_expected.clone());

        let hash = keccak256(lower_expected.as_bytes());
        let mut expected = String::from("0x");
        for (i, ch) in lower_expected.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_digit() || nibble < 8 {
                expected.push(ch);
            } else {
                expected.push(ch.to_ascii_uppercase());
            }
        }
        prop_assert_eq!(&checksummed, &expected);
        prop_assert_eq!(parse_address(&checksummed).unwrap(), Address::from(bytes));
    }

    #[test]
    fn digest_is_deterministic_and_bound_to_nonce_and_chain(tx in any_tx(), chain_id in 1u64..1_000_000_000) {
        let safe = Address::repeat_byte(0x5a);
        let first = digest(safe, chain_id, &tx);
        prop_assert_eq!(first, digest(safe, chain_id, &tx));

        let mut bumped = tx.clone();
        bumped.nonce = tx.nonce + U256::one();
        prop_assert_ne!(first, digest(safe, chain_id, &bumped));
        prop_assert_ne!(first, digest(safe, chain_id + 1, &tx));
        prop_assert_ne!(first, digest(Address::repeat_byte(0x5b), chain_id, &tx));
    }

    #[test]
    fn typed_data_hash_matches_digest(tx in any_tx(), chain_id in 1u64..1_000_000_000) {
        let safe = Address::repeat_byte(0x5a);
        let ctx = SafeTxContext::new(SafeDomain::new(safe, chain_id), tx.clone());
        let from_document = hash_typed_data(&ctx.typed_data()).unwrap();
        let expected = digest(safe, chain_id, &tx);
        prop_assert_eq!(&from_document, expected.as_bytes());
    }

    #[test]
    fn aggregate_ignores_arrival_order((sorted, shuffled) in artifact_sets()) {
        let expected: Vec<u8> = sorted.iter().flat_map(|a| a.data.to_vec()).collect();

        let from_sorted = aggregate(sorted.clone()).unwrap();
        let from_shuffled = aggregate(shuffled).unwrap();

        prop_assert_eq!(from_sorted.as_bytes(), expected.as_slice());
        prop_assert_eq!(from_shuffled.as_bytes(), expected.as_slice());
        prop_assert_eq!(from_shuffled.signature_count(), sorted.len());
    }

    #[test]
    fn only_four_recovery_bytes_remap(v in any::<u8>()) {
        match remap_recovery_byte(v) {
            Ok(marker) => {
                prop_assert!(matches!(v, 0 | 1 | 27 | 28));
                prop_assert_eq!(marker, if v == 0 || v == 27 { 31 } else { 32 });
            }
            Err(_) => prop_assert!(!matches!(v, 0 | 1 | 27 | 28)),
        }
    }
}
