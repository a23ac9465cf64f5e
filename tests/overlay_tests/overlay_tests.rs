//! Tests for the default overlay

use safekvs::error::ErrorCode;
use safekvs::overlay::{Overlay, ValueSource};
use safekvs::{KvsMap, KvsValue};

// =============================================================================
// Helper Functions
// =============================================================================

/// defaults {"d": 1}, working set {"k": 2}
fn setup_overlay() -> Overlay {
    let mut defaults = KvsMap::new();
    defaults.insert("d".to_string(), KvsValue::Number(1.0));

    let mut kvs = KvsMap::new();
    kvs.insert("k".to_string(), KvsValue::Number(2.0));

    Overlay::new(kvs, defaults)
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_fallback_scenario() {
    let overlay = setup_overlay();

    assert_eq!(overlay.get("k").unwrap(), KvsValue::Number(2.0));
    assert_eq!(overlay.get("d").unwrap(), KvsValue::Number(1.0));
    assert_eq!(overlay.get("x").unwrap_err().code(), ErrorCode::KeyNotFound);

    assert!(overlay.is_default("d").unwrap());
    assert!(!overlay.is_default("k").unwrap());
    assert_eq!(
        overlay.is_default("x").unwrap_err().code(),
        ErrorCode::KeyNotFound
    );
}

#[test]
fn test_lookup_reports_source() {
    let overlay = setup_overlay();

    assert!(matches!(overlay.lookup("k"), Some((_, ValueSource::Stored))));
    assert!(matches!(overlay.lookup("d"), Some((_, ValueSource::Default))));
    assert!(overlay.lookup("x").is_none());
}

#[test]
fn test_get_default_ignores_working_set() {
    let mut overlay = setup_overlay();
    overlay.set("d".to_string(), KvsValue::from("override"));

    assert_eq!(overlay.get("d").unwrap(), KvsValue::from("override"));
    assert_eq!(overlay.get_default("d").unwrap(), KvsValue::Number(1.0));
    assert_eq!(
        overlay.get_default("k").unwrap_err().code(),
        ErrorCode::KeyNotFound
    );
}

#[test]
fn test_keys_are_working_set_only() {
    let mut overlay = setup_overlay();
    overlay.set("a".to_string(), KvsValue::Null);

    assert_eq!(overlay.keys(), vec!["a".to_string(), "k".to_string()]);
    assert!(overlay.contains("k"));
    assert!(!overlay.contains("d"));
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_set_returns_previous() {
    let mut overlay = setup_overlay();

    assert_eq!(
        overlay.set("k".to_string(), KvsValue::Number(3.0)),
        Some(KvsValue::Number(2.0))
    );
    assert_eq!(overlay.set("new".to_string(), KvsValue::Null), None);
}

#[test]
fn test_remove_reveals_default() {
    let mut overlay = setup_overlay();
    overlay.set("d".to_string(), KvsValue::Number(5.0));

    assert_eq!(overlay.remove("d").unwrap(), KvsValue::Number(5.0));
    assert_eq!(overlay.get("d").unwrap(), KvsValue::Number(1.0));
    assert!(overlay.is_default("d").unwrap());

    assert_eq!(overlay.remove("d").unwrap_err().code(), ErrorCode::KeyNotFound);
}

#[test]
fn test_reset_key() {
    let mut overlay = setup_overlay();
    overlay.set("d".to_string(), KvsValue::Number(5.0));

    overlay.reset_key("d").unwrap();
    assert!(overlay.is_default("d").unwrap());

    assert_eq!(
        overlay.reset_key("k").unwrap_err().code(),
        ErrorCode::KeyDefaultNotFound
    );
    assert_eq!(overlay.get("k").unwrap(), KvsValue::Number(2.0));
}

#[test]
fn test_reset_clears_working_set() {
    let mut overlay = setup_overlay();

    overlay.reset();

    assert!(overlay.is_empty());
    assert_eq!(overlay.get("d").unwrap(), KvsValue::Number(1.0));
    assert_eq!(overlay.defaults().len(), 1);
}

#[test]
fn test_replace_working_set() {
    let mut overlay = setup_overlay();
    let mut restored = KvsMap::new();
    restored.insert("r".to_string(), KvsValue::from(true));

    let previous = overlay.replace_working_set(restored);

    assert_eq!(previous.len(), 1);
    assert_eq!(overlay.keys(), vec!["r".to_string()]);
    assert_eq!(overlay.len(), 1);
}
