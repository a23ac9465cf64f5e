//! Tests for KvsValue
//!
//! These tests verify:
//! - Construction from native types
//! - Typed extraction and type mismatch errors
//! - JSON conversion in both directions

use std::collections::HashMap;

use safekvs::error::ErrorCode;
use safekvs::{KvsError, KvsValue, KvsValueType};
use serde_json::{json, Value as JsonValue};

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_from_native_types() {
    assert_eq!(KvsValue::from(1.5), KvsValue::Number(1.5));
    assert_eq!(KvsValue::from(-3i32), KvsValue::Number(-3.0));
    assert_eq!(KvsValue::from(7u32), KvsValue::Number(7.0));
    assert_eq!(KvsValue::from(true), KvsValue::Boolean(true));
    assert_eq!(KvsValue::from("hi"), KvsValue::String("hi".to_string()));
    assert_eq!(KvsValue::from(()), KvsValue::Null);
}

#[test]
fn test_value_type() {
    assert_eq!(KvsValue::from(1.0).value_type(), KvsValueType::Number);
    assert_eq!(KvsValue::Null.value_type(), KvsValueType::Null);
    assert_eq!(KvsValue::Array(vec![]).value_type(), KvsValueType::Array);
    assert_eq!(
        KvsValue::Object(HashMap::new()).value_type(),
        KvsValueType::Object
    );
    assert_eq!(KvsValueType::Boolean.to_string(), "boolean");
}

#[test]
fn test_nesting() {
    assert_eq!(KvsValue::from(1.0).nesting(), 0);
    assert_eq!(KvsValue::Array(vec![]).nesting(), 1);

    let mut inner = HashMap::new();
    inner.insert("x".to_string(), KvsValue::Array(vec![KvsValue::Null]));
    let value = KvsValue::Array(vec![KvsValue::from("flat"), KvsValue::Object(inner)]);
    assert_eq!(value.nesting(), 3);
}

// =============================================================================
// Typed Extraction Tests
// =============================================================================

#[test]
fn test_try_from_matching_type() {
    let n: f64 = KvsValue::from(42.0).try_into().unwrap();
    assert_eq!(n, 42.0);

    let s: String = KvsValue::from("text").try_into().unwrap();
    assert_eq!(s, "text");

    let b = bool::try_from(&KvsValue::from(false)).unwrap();
    assert!(!b);

    assert!(<()>::try_from(KvsValue::Null).is_ok());
}

#[test]
fn test_try_from_mismatch() {
    let err = f64::try_from(KvsValue::from("not a number")).unwrap_err();

    match &err {
        KvsError::InvalidValueType { expected, actual } => {
            assert_eq!(*expected, KvsValueType::Number);
            assert_eq!(*actual, KvsValueType::String);
        }
        other => panic!("Expected InvalidValueType, got {:?}", other),
    }
    assert_eq!(err.code(), ErrorCode::InvalidValueType);
}

#[test]
fn test_accessors() {
    let value = KvsValue::Array(vec![KvsValue::from(1.0), KvsValue::Null]);

    assert_eq!(value.as_array().map(|a| a.len()), Some(2));
    assert!(value.as_f64().is_none());
    assert!(value.as_array().unwrap()[1].is_null());
}

// =============================================================================
// JSON Conversion Tests
// =============================================================================

#[test]
fn test_json_to_value_nested() {
    let json = json!({
        "name": "sensor",
        "limits": [1, 2.5, null],
        "enabled": true
    });

    let value = KvsValue::try_from(&json).unwrap();
    let object = value.as_object().unwrap();

    assert_eq!(object["name"], KvsValue::from("sensor"));
    assert_eq!(object["enabled"], KvsValue::from(true));
    assert_eq!(
        object["limits"],
        KvsValue::Array(vec![
            KvsValue::Number(1.0),
            KvsValue::Number(2.5),
            KvsValue::Null
        ])
    );
}

#[test]
fn test_integer_json_becomes_number() {
    let value = KvsValue::try_from(&json!(123)).unwrap();
    assert_eq!(value, KvsValue::Number(123.0));
}

#[test]
fn test_value_to_json() {
    let mut map = HashMap::new();
    map.insert("a".to_string(), KvsValue::from(1.0));
    map.insert("b".to_string(), KvsValue::from(vec![KvsValue::from("x")]));

    let json = JsonValue::try_from(&KvsValue::Object(map)).unwrap();
    assert_eq!(json, json!({"a": 1.0, "b": ["x"]}));
}

#[test]
fn test_non_finite_number_fails_conversion() {
    for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let nested = KvsValue::Array(vec![KvsValue::from(1.0), KvsValue::Number(n)]);
        let err = JsonValue::try_from(&nested).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConversionFailed);
    }
}
