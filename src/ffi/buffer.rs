//! Flat value codec
//!
//! Encodes a `KvsValue` tree into one self-contained buffer and back.
//!
//! ## Node Format
//! ```text
//! ┌──────────┬──────────────────────────────────────────┐
//! │ Tag (1)  │ Payload                                  │
//! └──────────┴──────────────────────────────────────────┘
//! ```
//!
//! ### Payload by Tag
//! - 0x01 NUMBER:  f64 (8)
//! - 0x02 BOOLEAN: u8 (1), 0 or 1
//! - 0x03 STRING:  len (4) + UTF-8 bytes
//! - 0x04 NULL:    empty
//! - 0x05 ARRAY:   count (4) + count nodes
//! - 0x06 OBJECT:  count (4) + count × (key_len (4) + key + node)
//!
//! All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KvsError, Result};
use crate::value::{KvsMap, KvsValue};

pub const TAG_NUMBER: u8 = 0x01;
pub const TAG_BOOLEAN: u8 = 0x02;
pub const TAG_STRING: u8 = 0x03;
pub const TAG_NULL: u8 = 0x04;
pub const TAG_ARRAY: u8 = 0x05;
pub const TAG_OBJECT: u8 = 0x06;

/// Most containers the decoder accepts on one path from the root
///
/// `MAX_DEPTH` nested arrays or objects decode; one more is rejected.
pub const MAX_DEPTH: usize = 128;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value tree into a flat buffer
pub fn encode_value(value: &KvsValue) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_into(value, &mut buf)?;
    Ok(buf.freeze())
}

fn encode_into(value: &KvsValue, buf: &mut BytesMut) -> Result<()> {
    match value {
        KvsValue::Number(n) => {
            buf.put_u8(TAG_NUMBER);
            buf.put_f64(*n);
        }
        KvsValue::Boolean(b) => {
            buf.put_u8(TAG_BOOLEAN);
            buf.put_u8(u8::from(*b));
        }
        KvsValue::String(s) => {
            buf.put_u8(TAG_STRING);
            put_bytes(buf, s.as_bytes())?;
        }
        KvsValue::Null => buf.put_u8(TAG_NULL),
        KvsValue::Array(items) => {
            buf.put_u8(TAG_ARRAY);
            put_len(buf, items.len())?;
            for item in items {
                encode_into(item, buf)?;
            }
        }
        KvsValue::Object(map) => {
            buf.put_u8(TAG_OBJECT);
            put_len(buf, map.len())?;
            for (key, item) in map {
                put_bytes(buf, key.as_bytes())?;
                encode_into(item, buf)?;
            }
        }
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| KvsError::Serialization(format!("length {} exceeds u32 range", len)))?;
    buf.put_u32(len);
    Ok(())
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    put_len(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a flat buffer produced by `encode_value`
///
/// The whole buffer must be exactly one node.
pub fn decode_value(bytes: &[u8]) -> Result<KvsValue> {
    let mut cursor = bytes;
    let value = decode_from(&mut cursor, 0)?;

    if cursor.has_remaining() {
        return Err(KvsError::ConversionFailed(format!(
            "{} trailing bytes after value",
            cursor.remaining()
        )));
    }
    Ok(value)
}

/// `depth` counts the containers enclosing the node being decoded
fn decode_from(buf: &mut &[u8], depth: usize) -> Result<KvsValue> {
    if depth > MAX_DEPTH {
        return Err(KvsError::ConversionFailed(format!(
            "more than {} nested containers",
            MAX_DEPTH
        )));
    }

    let tag = take_u8(buf)?;
    match tag {
        TAG_NUMBER => {
            ensure_remaining(buf, 8, "number")?;
            Ok(KvsValue::Number(buf.get_f64()))
        }
        TAG_BOOLEAN => match take_u8(buf)? {
            0 => Ok(KvsValue::Boolean(false)),
            1 => Ok(KvsValue::Boolean(true)),
            other => Err(KvsError::ConversionFailed(format!(
                "invalid boolean byte 0x{:02x}",
                other
            ))),
        },
        TAG_STRING => take_string(buf).map(KvsValue::String),
        TAG_NULL => Ok(KvsValue::Null),
        TAG_ARRAY => {
            let count = take_count(buf)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_from(buf, depth + 1)?);
            }
            Ok(KvsValue::Array(items))
        }
        TAG_OBJECT => {
            let count = take_count(buf)?;
            let mut map = KvsMap::with_capacity(count);
            for _ in 0..count {
                let key = take_string(buf)?;
                let item = decode_from(buf, depth + 1)?;
                if map.contains_key(&key) {
                    return Err(KvsError::ConversionFailed(format!(
                        "duplicate object key {:?}",
                        key
                    )));
                }
                map.insert(key, item);
            }
            Ok(KvsValue::Object(map))
        }
        _ => Err(KvsError::ConversionFailed(format!(
            "unknown value tag: 0x{:02x}",
            tag
        ))),
    }
}

fn ensure_remaining(buf: &&[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(KvsError::ConversionFailed(format!(
            "incomplete {}: expected {} bytes, got {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    ensure_remaining(buf, 1, "tag")?;
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    ensure_remaining(buf, 4, "length")?;
    Ok(buf.get_u32())
}

/// Element count, bounded by the bytes left (every node is at least 1 byte)
fn take_count(buf: &mut &[u8]) -> Result<usize> {
    let count = take_u32(buf)? as usize;
    ensure_remaining(buf, count, "collection")?;
    Ok(count)
}

fn take_string(buf: &mut &[u8]) -> Result<String> {
    let len = take_u32(buf)? as usize;
    ensure_remaining(buf, len, "string")?;
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    String::from_utf8(head.to_vec())
        .map_err(|e| KvsError::ConversionFailed(format!("invalid UTF-8 in string: {}", e)))
}
