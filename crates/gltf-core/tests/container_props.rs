//! Property tests for the container codec and the structural hash.

use gltf_core::chunk::{read_glb, write_glb};
use gltf_core::hash::structural_hash;
use proptest::prelude::*;
use serde_json::{Map, Value};

proptest! {
    #[test]
    fn glb_roundtrip_preserves_chunks(
        json in proptest::collection::vec(any::<u8>(), 0..256),
        bin in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..256)),
    ) {
        let glb = write_glb(&json, bin.as_deref());
        let chunks = read_glb(&glb).expect("written container must parse");

        prop_assert_eq!(&chunks.json[..json.len()], &json[..]);
        prop_assert!(chunks.json[json.len()..].iter().all(|&b| b == b' '));
        prop_assert_eq!(chunks.json.len() % 4, 0);

        match (&bin, chunks.bin) {
            (Some(expected), Some(found)) => {
                prop_assert_eq!(&found[..expected.len()], &expected[..]);
                prop_assert!(found[expected.len()..].iter().all(|&b| b == 0));
            }
            (None, None) => {}
            _ => prop_assert!(false, "binary chunk presence changed"),
        }
    }

    #[test]
    fn aligned_chunks_roundtrip_exactly(
        json_words in proptest::collection::vec(any::<[u8; 4]>(), 1..32),
        bin_words in proptest::collection::vec(any::<[u8; 4]>(), 0..32),
    ) {
        let json: Vec<u8> = json_words.concat();
        let bin: Vec<u8> = bin_words.concat();
        let glb = write_glb(&json, Some(&bin));
        let chunks = read_glb(&glb).unwrap();
        prop_assert_eq!(chunks.json, &json[..]);
        prop_assert_eq!(chunks.bin, Some(&bin[..]));
    }

    #[test]
    fn hash_ignores_key_order(
        entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 1..8),
    ) {
        let forward: Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        let reversed: Map<String, Value> = entries
            .iter()
            .rev()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();

        prop_assert_eq!(
            structural_hash(&Value::Object(forward), &[]),
            structural_hash(&Value::Object(reversed), &[])
        );
    }

    #[test]
    fn hash_detects_value_change(base in any::<i32>(), delta in 1i32..1000) {
        let a = serde_json::json!({"attributes": {"POSITION": base}});
        let b = serde_json::json!({"attributes": {"POSITION": base.wrapping_add(delta)}});
        prop_assert_ne!(structural_hash(&a, &[]), structural_hash(&b, &[]));
    }
}
