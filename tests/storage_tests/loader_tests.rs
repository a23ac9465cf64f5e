//! Tests for the payload loader and writer
//!
//! These tests verify:
//! - Optional vs required payload files
//! - Hash sidecar handling (missing, short, mismatching)
//! - Parse failures and non-object roots
//! - Writer output verifies against its own hash
//! - Numbers and nesting survive a write/load cycle exactly

use std::fs;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use safekvs::checksum::hash_bytes;
use safekvs::error::ErrorCode;
use safekvs::storage::{load_map, serialize_map, write_file_synced, EncodedSnapshot, NeedFile, VerifyHash};
use safekvs::{KvsMap, KvsValue, MAX_NESTING};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("kvs_0_0.json"), dir.join("kvs_0_0.hash"))
}

fn nested_arrays(levels: usize) -> KvsValue {
    let mut value = KvsValue::Null;
    for _ in 0..levels {
        value = KvsValue::Array(vec![value]);
    }
    value
}

fn write_and_load(dir: &Path, map: &KvsMap) -> KvsMap {
    let (json, hash) = paths(dir);
    let encoded = EncodedSnapshot::encode(map).unwrap();
    write_file_synced(&json, &encoded.payload).unwrap();
    write_file_synced(&hash, &encoded.hash).unwrap();
    load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap()
}

fn write_pair(dir: &Path, payload: &[u8]) -> (PathBuf, PathBuf) {
    let (json, hash) = paths(dir);
    fs::write(&json, payload).unwrap();
    fs::write(&hash, hash_bytes(payload)).unwrap();
    (json, hash)
}

// =============================================================================
// Missing File Tests
// =============================================================================

#[test]
fn test_missing_optional_is_empty() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = paths(temp.path());

    let map = load_map(&json, &hash, NeedFile::Optional, VerifyHash::Yes).unwrap();
    assert!(map.is_empty());
}

#[test]
fn test_missing_required_fails() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = paths(temp.path());

    let err = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KvsFileReadError);
}

// =============================================================================
// Hash Verification Tests
// =============================================================================

#[test]
fn test_valid_pair_loads() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = write_pair(temp.path(), br#"{"kvs":2,"name":"x"}"#);

    let map = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["kvs"], KvsValue::Number(2.0));
    assert_eq!(map["name"], KvsValue::from("x"));
}

#[test]
fn test_missing_hash_fails_even_if_optional() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = paths(temp.path());
    fs::write(&json, br#"{"a":1}"#).unwrap();

    let err = load_map(&json, &hash, NeedFile::Optional, VerifyHash::Yes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KvsHashFileReadError);
}

#[test]
fn test_short_hash_fails() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = write_pair(temp.path(), br#"{"a":1}"#);
    fs::write(&hash, [0x00, 0x01]).unwrap();

    let err = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KvsHashFileReadError);
}

#[test]
fn test_tampered_payload_fails_validation() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = write_pair(temp.path(), br#"{"a":1}"#);
    fs::write(&json, br#"{"a":2}"#).unwrap();

    let err = load_map(&json, &hash, NeedFile::Optional, VerifyHash::Yes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationFailed);
}

#[test]
fn test_unverified_load_ignores_hash() {
    let temp = TempDir::new().unwrap();
    let json = temp.path().join("kvs_0_default.json");
    fs::write(&json, br#"{"d":1}"#).unwrap();

    let map = load_map(&json, &json, NeedFile::Required, VerifyHash::No).unwrap();
    assert_eq!(map["d"], KvsValue::Number(1.0));
}

// =============================================================================
// Parse Tests
// =============================================================================

#[test]
fn test_invalid_json_fails_parse() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = write_pair(temp.path(), b"{ not json");

    let err = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::JsonParserError);
}

#[test]
fn test_non_object_root_is_empty() {
    let temp = TempDir::new().unwrap();

    for payload in [&b"[1,2,3]"[..], b"42", b"\"text\"", b"null"] {
        let (json, hash) = write_pair(temp.path(), payload);
        let map = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap();
        assert!(map.is_empty(), "root {:?}", String::from_utf8_lossy(payload));
    }
}

#[test]
fn test_nested_values_load() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = write_pair(temp.path(), br#"{"o":{"list":[true,null,"s",1.25]}}"#);

    let map = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap();
    let inner = map["o"].as_object().unwrap();
    assert_eq!(
        inner["list"],
        KvsValue::Array(vec![
            KvsValue::Boolean(true),
            KvsValue::Null,
            KvsValue::from("s"),
            KvsValue::Number(1.25),
        ])
    );
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_encoded_snapshot_round_trip() {
    let temp = TempDir::new().unwrap();
    let (json, hash) = paths(temp.path());

    let mut map = KvsMap::new();
    map.insert("x".to_string(), KvsValue::from(1.0));
    map.insert("y".to_string(), KvsValue::from(vec![KvsValue::from("z")]));

    let encoded = EncodedSnapshot::encode(&map).unwrap();
    assert_eq!(encoded.hash, hash_bytes(&encoded.payload));

    write_file_synced(&json, &encoded.payload).unwrap();
    write_file_synced(&hash, &encoded.hash).unwrap();

    let loaded = load_map(&json, &hash, NeedFile::Required, VerifyHash::Yes).unwrap();
    assert_eq!(loaded, map);
}

#[test]
fn test_serialize_is_deterministic() {
    let mut first = KvsMap::new();
    let mut second = KvsMap::new();
    for i in 0..50 {
        first.insert(format!("k{}", i), KvsValue::from(i as f64));
    }
    for i in (0..50).rev() {
        second.insert(format!("k{}", i), KvsValue::from(i as f64));
    }

    assert_eq!(serialize_map(&first).unwrap(), serialize_map(&second).unwrap());
}

#[test]
fn test_serialize_non_finite_fails() {
    let mut map = KvsMap::new();
    map.insert("bad".to_string(), KvsValue::Number(f64::NAN));

    let err = serialize_map(&map).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConversionFailed);
}

// =============================================================================
// Round-trip Fidelity Tests
// =============================================================================

#[test]
fn test_numbers_reload_bit_exact() {
    let temp = TempDir::new().unwrap();

    // xorshift64 over raw bit patterns covers every exponent range
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    let mut map = KvsMap::new();
    map.insert("tiny".to_string(), KvsValue::Number(1.0715660391465826e-75));
    while map.len() < 5000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let n = f64::from_bits(state);
        if n.is_finite() {
            map.insert(format!("n{}", map.len()), KvsValue::Number(n));
        }
    }

    let loaded = write_and_load(temp.path(), &map);
    for (key, value) in &map {
        let expected = value.as_f64().unwrap();
        let actual = loaded[key].as_f64().unwrap();
        assert_eq!(actual.to_bits(), expected.to_bits(), "key {}", key);
    }
}

#[test]
fn test_deepest_storable_value_reloads() {
    let temp = TempDir::new().unwrap();
    let mut map = KvsMap::new();
    map.insert("deep".to_string(), nested_arrays(MAX_NESTING));

    assert_eq!(write_and_load(temp.path(), &map), map);
}

#[test]
fn test_serialize_too_deep_fails() {
    let mut map = KvsMap::new();
    map.insert("deep".to_string(), nested_arrays(MAX_NESTING + 1));

    let err = serialize_map(&map).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConversionFailed);
}

fn arb_finite() -> impl Strategy<Value = f64> {
    any::<u64>()
        .prop_map(f64::from_bits)
        .prop_filter("finite", |n| n.is_finite())
}

fn arb_value() -> impl Strategy<Value = KvsValue> {
    let leaf = prop_oneof![
        Just(KvsValue::Null),
        any::<bool>().prop_map(KvsValue::Boolean),
        arb_finite().prop_map(KvsValue::Number),
        ".{0,12}".prop_map(KvsValue::String),
    ];
    leaf.prop_recursive(5, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(KvsValue::Array),
            prop::collection::hash_map(".{0,8}", inner, 0..6).prop_map(KvsValue::Object),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_write_load_round_trip(map in prop::collection::hash_map(".{0,8}", arb_value(), 0..8)) {
        let temp = TempDir::new().unwrap();
        prop_assert_eq!(write_and_load(temp.path(), &map), map);
    }
}
