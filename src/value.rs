//! Value Model
//!
//! `KvsValue` is the recursive tagged value stored under every key.
//!
//! ## Ownership
//! A value is a finite tree: each `Array`/`Object` exclusively owns its
//! children, so there is no sharing and no way to build a cycle.
//!
//! ## JSON Conversion
//! Values convert to and from `serde_json::Value`, the generic parse tree the
//! storage layer reads and writes. Conversion is eager and all-or-nothing:
//! a single unconvertible node fails the whole tree with `ConversionFailed`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{KvsError, Result};

/// Mapping from key to value (working set, default set, objects)
pub type KvsMap = HashMap<String, KvsValue>;

/// Most containers a stored value may nest below its key
///
/// A payload is parsed with a limit of 127 nested containers, and its root
/// object takes one of them.
pub const MAX_NESTING: usize = 126;

/// A typed value stored in the KVS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KvsValue {
    /// 64-bit float
    Number(f64),

    /// Boolean
    Boolean(bool),

    /// UTF-8 text
    String(String),

    /// Explicit null
    Null,

    /// Ordered sequence
    Array(Vec<KvsValue>),

    /// Key → value mapping (key order is not significant)
    Object(HashMap<String, KvsValue>),
}

/// Discriminant of a `KvsValue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvsValueType {
    Number,
    Boolean,
    String,
    Null,
    Array,
    Object,
}

impl fmt::Display for KvsValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KvsValueType::Number => "number",
            KvsValueType::Boolean => "boolean",
            KvsValueType::String => "string",
            KvsValueType::Null => "null",
            KvsValueType::Array => "array",
            KvsValueType::Object => "object",
        };
        f.write_str(name)
    }
}

impl KvsValue {
    /// Get the type of this value
    pub fn value_type(&self) -> KvsValueType {
        match self {
            KvsValue::Number(_) => KvsValueType::Number,
            KvsValue::Boolean(_) => KvsValueType::Boolean,
            KvsValue::String(_) => KvsValueType::String,
            KvsValue::Null => KvsValueType::Null,
            KvsValue::Array(_) => KvsValueType::Array,
            KvsValue::Object(_) => KvsValueType::Object,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KvsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KvsValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[KvsValue]> {
        match self {
            KvsValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, KvsValue>> {
        match self {
            KvsValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, KvsValue::Null)
    }

    /// Containers on the deepest path of this tree (a scalar is 0)
    pub fn nesting(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0usize)];

        while let Some((value, depth)) = pending.pop() {
            let depth = depth + 1;
            match value {
                KvsValue::Array(items) => {
                    deepest = deepest.max(depth);
                    pending.extend(items.iter().map(|item| (item, depth)));
                }
                KvsValue::Object(map) => {
                    deepest = deepest.max(depth);
                    pending.extend(map.values().map(|item| (item, depth)));
                }
                _ => {}
            }
        }
        deepest
    }

    fn type_mismatch(&self, expected: KvsValueType) -> KvsError {
        KvsError::InvalidValueType {
            expected,
            actual: self.value_type(),
        }
    }
}

// =============================================================================
// Construction
// =============================================================================

impl From<f64> for KvsValue {
    fn from(n: f64) -> Self {
        KvsValue::Number(n)
    }
}

impl From<i32> for KvsValue {
    fn from(n: i32) -> Self {
        KvsValue::Number(f64::from(n))
    }
}

impl From<u32> for KvsValue {
    fn from(n: u32) -> Self {
        KvsValue::Number(f64::from(n))
    }
}

impl From<bool> for KvsValue {
    fn from(b: bool) -> Self {
        KvsValue::Boolean(b)
    }
}

impl From<&str> for KvsValue {
    fn from(s: &str) -> Self {
        KvsValue::String(s.to_string())
    }
}

impl From<String> for KvsValue {
    fn from(s: String) -> Self {
        KvsValue::String(s)
    }
}

impl From<()> for KvsValue {
    fn from(_: ()) -> Self {
        KvsValue::Null
    }
}

impl From<Vec<KvsValue>> for KvsValue {
    fn from(items: Vec<KvsValue>) -> Self {
        KvsValue::Array(items)
    }
}

impl From<HashMap<String, KvsValue>> for KvsValue {
    fn from(map: HashMap<String, KvsValue>) -> Self {
        KvsValue::Object(map)
    }
}

// =============================================================================
// Typed Extraction
// =============================================================================

/// Implements owned and borrowed `TryFrom<KvsValue>` for one variant
macro_rules! impl_try_from_value {
    ($target:ty, $variant:ident) => {
        impl TryFrom<KvsValue> for $target {
            type Error = KvsError;

            fn try_from(value: KvsValue) -> Result<Self> {
                match value {
                    KvsValue::$variant(inner) => Ok(inner),
                    other => Err(other.type_mismatch(KvsValueType::$variant)),
                }
            }
        }

        impl TryFrom<&KvsValue> for $target {
            type Error = KvsError;

            fn try_from(value: &KvsValue) -> Result<Self> {
                match value {
                    KvsValue::$variant(inner) => Ok(inner.clone()),
                    other => Err(other.type_mismatch(KvsValueType::$variant)),
                }
            }
        }
    };
}

impl_try_from_value!(f64, Number);
impl_try_from_value!(bool, Boolean);
impl_try_from_value!(String, String);
impl_try_from_value!(Vec<KvsValue>, Array);
impl_try_from_value!(HashMap<String, KvsValue>, Object);

impl TryFrom<KvsValue> for () {
    type Error = KvsError;

    fn try_from(value: KvsValue) -> Result<Self> {
        match value {
            KvsValue::Null => Ok(()),
            other => Err(other.type_mismatch(KvsValueType::Null)),
        }
    }
}

// =============================================================================
// JSON Conversion
// =============================================================================

impl TryFrom<&JsonValue> for KvsValue {
    type Error = KvsError;

    fn try_from(json: &JsonValue) -> Result<Self> {
        match json {
            JsonValue::Null => Ok(KvsValue::Null),
            JsonValue::Bool(b) => Ok(KvsValue::Boolean(*b)),
            JsonValue::Number(n) => n.as_f64().map(KvsValue::Number).ok_or_else(|| {
                KvsError::ConversionFailed(format!("number {} has no f64 representation", n))
            }),
            JsonValue::String(s) => Ok(KvsValue::String(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(KvsValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(KvsValue::Array),
            JsonValue::Object(map) => json_object_to_map(map).map(KvsValue::Object),
        }
    }
}

impl TryFrom<&KvsValue> for JsonValue {
    type Error = KvsError;

    fn try_from(value: &KvsValue) -> Result<Self> {
        match value {
            KvsValue::Null => Ok(JsonValue::Null),
            KvsValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
            KvsValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .ok_or_else(|| {
                    KvsError::ConversionFailed(format!("number {} is not representable in JSON", n))
                }),
            KvsValue::String(s) => Ok(JsonValue::String(s.clone())),
            KvsValue::Array(items) => items
                .iter()
                .map(JsonValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            KvsValue::Object(map) => map_to_json_object(map).map(JsonValue::Object),
        }
    }
}

/// Convert every member of a JSON object, failing as a unit
pub fn json_object_to_map(object: &serde_json::Map<String, JsonValue>) -> Result<KvsMap> {
    object
        .iter()
        .map(|(key, value)| Ok((key.clone(), KvsValue::try_from(value)?)))
        .collect()
}

/// Convert a key → value mapping into a JSON object
pub fn map_to_json_object(map: &KvsMap) -> Result<serde_json::Map<String, JsonValue>> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), JsonValue::try_from(value)?)))
        .collect()
}
