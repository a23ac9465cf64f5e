//! Integrity Hasher
//!
//! Adler-32 over the exact bytes of a payload file. The checksum is stored
//! next to the payload as 4 raw bytes, most significant byte first.
//!
//! The hash covers serialized bytes, not the logical value tree: anything
//! that changes the bytes (whitespace, key order, number formatting) changes
//! the hash, so writer and verifier must always see the same byte sequence.

use std::path::Path;

use crate::error::{KvsError, Result};

/// Largest prime below 2^16
const MOD_ADLER: u32 = 65_521;

/// Bytes that can be summed before `b` could overflow a u32
const NMAX: usize = 5552;

/// Size of a hash sidecar file in bytes
pub const HASH_SIZE: usize = 4;

/// Streaming Adler-32 hasher
#[derive(Debug, Clone, Copy)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Feed more bytes into the checksum
    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    /// Current checksum value
    pub fn finalize(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot Adler-32 of `data`
pub fn adler32(data: &[u8]) -> u32 {
    let mut hasher = Adler32::new();
    hasher.update(data);
    hasher.finalize()
}

/// Adler-32 of `data` in its on-disk (big-endian) form
pub fn hash_bytes(data: &[u8]) -> [u8; HASH_SIZE] {
    adler32(data).to_be_bytes()
}

/// Decode a sidecar's contents into the stored checksum
///
/// Only the first 4 bytes are significant; shorter input is unreadable.
pub fn decode_hash(raw: &[u8], path: &Path) -> Result<u32> {
    match raw.get(..HASH_SIZE) {
        Some(bytes) => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(KvsError::KvsHashFileRead {
            path: path.to_path_buf(),
            reason: format!("expected {} bytes, got {}", HASH_SIZE, raw.len()),
        }),
    }
}

/// Verify `data` against a stored checksum
///
/// `path` names the payload for error reporting.
pub fn verify(data: &[u8], stored: u32, path: &Path) -> Result<()> {
    let computed = adler32(data);
    if computed != stored {
        return Err(KvsError::ValidationFailed {
            path: path.to_path_buf(),
            stored,
            computed,
        });
    }
    Ok(())
}
