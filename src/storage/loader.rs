//! Payload Loader
//!
//! Reads one payload file (plus its hash sidecar when required) into a
//! `KvsMap`. Used for the default file, generation 0 at open, and any
//! generation on restore.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::checksum;
use crate::error::{KvsError, Result};
use crate::value::{self, KvsMap};

/// Whether a missing payload is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedFile {
    Optional,
    Required,
}

/// Whether the payload is checked against its sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyHash {
    No,
    Yes,
}

/// Load a payload file into a map
///
/// Resolution order:
/// 1. Read payload (missing + Optional → empty map, done)
/// 2. Verify the hash sidecar if requested
/// 3. Parse JSON
/// 4. Non-object root → empty map
/// 5. Convert every member; one failure fails the whole load
pub fn load_map(payload: &Path, hash: &Path, need: NeedFile, verify: VerifyHash) -> Result<KvsMap> {
    // Step 1: Read payload bytes
    let data = match fs::read(payload) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound && need == NeedFile::Optional => {
            debug!(file = %payload.display(), "File not found, using empty data");
            return Ok(KvsMap::new());
        }
        Err(e) => {
            error!(file = %payload.display(), error = %e, "File could not be read");
            return Err(KvsError::KvsFileRead {
                path: payload.to_path_buf(),
                source: e,
            });
        }
    };

    // Step 2: Verify against the sidecar
    if verify == VerifyHash::Yes {
        let raw = fs::read(hash).map_err(|e| {
            error!(file = %hash.display(), error = %e, "Hash file could not be read");
            KvsError::KvsHashFileRead {
                path: hash.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        let stored = checksum::decode_hash(&raw, hash)?;
        if let Err(e) = checksum::verify(&data, stored, payload) {
            error!(file = %payload.display(), hash = %hash.display(), "KVS data corrupted");
            return Err(e);
        }
        debug!(file = %payload.display(), "JSON data has valid hash");
    }

    // Step 3: Parse
    let root: JsonValue = serde_json::from_slice(&data)
        .map_err(|e| KvsError::JsonParser(format!("{}: {}", payload.display(), e)))?;

    // Steps 4-5: Convert
    match root {
        JsonValue::Object(object) => value::json_object_to_map(&object),
        other => {
            warn!(
                file = %payload.display(),
                root = json_kind(&other),
                "JSON root is not an object, using empty map"
            );
            Ok(KvsMap::new())
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
