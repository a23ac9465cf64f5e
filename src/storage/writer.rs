//! Payload Writer
//!
//! Serializes a map to payload bytes and writes files durably.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::checksum::{self, HASH_SIZE};
use crate::error::{KvsError, Result};
use crate::value::{self, KvsMap, MAX_NESTING};

/// A serialized generation, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    /// JSON payload bytes
    pub payload: Vec<u8>,
    /// Adler-32 of `payload`, big-endian
    pub hash: [u8; HASH_SIZE],
}

impl EncodedSnapshot {
    /// Serialize `map` and checksum the exact resulting bytes
    pub fn encode(map: &KvsMap) -> Result<Self> {
        let payload = serialize_map(map)?;
        let hash = checksum::hash_bytes(&payload);
        Ok(Self { payload, hash })
    }
}

/// Map → JSON object → bytes
///
/// `serde_json::Map` keeps keys sorted, so equal maps give equal bytes.
/// A value nesting deeper than `MAX_NESTING` fails with `ConversionFailed`
/// before anything is written.
pub fn serialize_map(map: &KvsMap) -> Result<Vec<u8>> {
    if let Some((key, value)) = map.iter().find(|(_, v)| v.nesting() > MAX_NESTING) {
        return Err(KvsError::ConversionFailed(format!(
            "value of key {:?} nests {} levels, at most {} can be stored",
            key,
            value.nesting(),
            MAX_NESTING
        )));
    }

    let object = JsonValue::Object(value::map_to_json_object(map)?);
    serde_json::to_vec(&object).map_err(|e| KvsError::JsonGenerator(e.to_string()))
}

/// Create/truncate `path`, write `data`, and sync it to disk
pub fn write_file_synced(path: &Path, data: &[u8]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;

    let file: File = writer
        .into_inner()
        .map_err(|e| KvsError::from(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
