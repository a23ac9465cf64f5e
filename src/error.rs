//! Error types for SafeKVS
//!
//! `KvsError` carries the context of a failure; `ErrorCode` is the closed,
//! stable taxonomy every error maps onto (and what crosses the C boundary).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::value::KvsValueType;

/// Result type alias using KvsError
pub type Result<T> = std::result::Result<T, KvsError>;

/// Unified error type for SafeKVS operations
#[derive(Debug, Error)]
pub enum KvsError {
    // -------------------------------------------------------------------------
    // File Errors
    // -------------------------------------------------------------------------
    #[error("Error that was not yet mapped: {0}")]
    Unmapped(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("KVS file read error: {}: {source}", .path.display())]
    KvsFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("KVS hash file read error: {}: {reason}", .path.display())]
    KvsHashFileRead { path: PathBuf, reason: String },

    #[error("Physical storage failure: {0}")]
    PhysicalStorage(#[source] io::Error),

    #[error("Out of storage space: {0}")]
    OutOfStorageSpace(#[source] io::Error),

    // -------------------------------------------------------------------------
    // JSON Errors
    // -------------------------------------------------------------------------
    #[error("JSON parser error: {0}")]
    JsonParser(String),

    #[error("JSON generator error: {0}")]
    JsonGenerator(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Integrity corrupted: {0}")]
    IntegrityCorrupted(String),

    #[error(
        "Validation failed: {} (stored hash {stored:#010x}, computed {computed:#010x})",
        .path.display()
    )]
    ValidationFailed {
        path: PathBuf,
        stored: u32,
        computed: u32,
    },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Resource is busy: {0}")]
    ResourceBusy(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key has no default value: {0}")]
    KeyDefaultNotFound(String),

    // -------------------------------------------------------------------------
    // Value Errors
    // -------------------------------------------------------------------------
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Invalid value type: expected {expected}, found {actual}")]
    InvalidValueType {
        expected: KvsValueType,
        actual: KvsValueType,
    },

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Invalid snapshot ID: {0}")]
    InvalidSnapshotId(usize),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Mutex lock failed: {0}")]
    MutexLockFailed(String),
}

impl KvsError {
    /// The taxonomy kind of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            KvsError::Unmapped(_) => ErrorCode::UnmappedError,
            KvsError::FileNotFound(_) => ErrorCode::FileNotFound,
            KvsError::KvsFileRead { .. } => ErrorCode::KvsFileReadError,
            KvsError::KvsHashFileRead { .. } => ErrorCode::KvsHashFileReadError,
            KvsError::PhysicalStorage(_) => ErrorCode::PhysicalStorageFailure,
            KvsError::OutOfStorageSpace(_) => ErrorCode::OutOfStorageSpace,
            KvsError::JsonParser(_) => ErrorCode::JsonParserError,
            KvsError::JsonGenerator(_) => ErrorCode::JsonGeneratorError,
            KvsError::IntegrityCorrupted(_) => ErrorCode::IntegrityCorrupted,
            KvsError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            KvsError::EncryptionFailed(_) => ErrorCode::EncryptionFailed,
            KvsError::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
            KvsError::ResourceBusy(_) => ErrorCode::ResourceBusy,
            KvsError::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            KvsError::KeyNotFound(_) => ErrorCode::KeyNotFound,
            KvsError::KeyDefaultNotFound(_) => ErrorCode::KeyDefaultNotFound,
            KvsError::Serialization(_) => ErrorCode::SerializationFailed,
            KvsError::ConversionFailed(_) => ErrorCode::ConversionFailed,
            KvsError::InvalidValueType { .. } => ErrorCode::InvalidValueType,
            KvsError::InvalidSnapshotId(_) => ErrorCode::InvalidSnapshotId,
            KvsError::MutexLockFailed(_) => ErrorCode::MutexLockFailed,
        }
    }
}

/// ENOSPC on Linux and the BSDs
const ENOSPC: i32 = 28;

impl From<io::Error> for KvsError {
    fn from(err: io::Error) -> Self {
        if err.raw_os_error() == Some(ENOSPC) {
            KvsError::OutOfStorageSpace(err)
        } else {
            KvsError::PhysicalStorage(err)
        }
    }
}

/// Closed error taxonomy
///
/// Discriminants are stable: they are the status values returned over the
/// C ABI (see `ffi::exports`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnmappedError = 0,
    FileNotFound = 1,
    KvsFileReadError = 2,
    KvsHashFileReadError = 3,
    JsonParserError = 4,
    JsonGeneratorError = 5,
    PhysicalStorageFailure = 6,
    IntegrityCorrupted = 7,
    ValidationFailed = 8,
    EncryptionFailed = 9,
    ResourceBusy = 10,
    OutOfStorageSpace = 11,
    QuotaExceeded = 12,
    AuthenticationFailed = 13,
    KeyNotFound = 14,
    KeyDefaultNotFound = 15,
    SerializationFailed = 16,
    InvalidSnapshotId = 17,
    ConversionFailed = 18,
    MutexLockFailed = 19,
    InvalidValueType = 20,
}

impl ErrorCode {
    /// Canonical human-readable text for the kind
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::UnmappedError => "Error that was not yet mapped",
            ErrorCode::FileNotFound => "File not found",
            ErrorCode::KvsFileReadError => "KVS file read error",
            ErrorCode::KvsHashFileReadError => "KVS hash file read error",
            ErrorCode::JsonParserError => "JSON parser error",
            ErrorCode::JsonGeneratorError => "JSON generator error",
            ErrorCode::PhysicalStorageFailure => "Physical storage failure",
            ErrorCode::IntegrityCorrupted => "Integrity corrupted",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::EncryptionFailed => "Encryption failed",
            ErrorCode::ResourceBusy => "Resource is busy",
            ErrorCode::OutOfStorageSpace => "Out of storage space",
            ErrorCode::QuotaExceeded => "Quota exceeded",
            ErrorCode::AuthenticationFailed => "Authentication failed",
            ErrorCode::KeyNotFound => "Key not found",
            ErrorCode::KeyDefaultNotFound => "Key default value not found",
            ErrorCode::SerializationFailed => "Serialization failed",
            ErrorCode::InvalidSnapshotId => "Invalid snapshot ID",
            ErrorCode::ConversionFailed => "Conversion failed",
            ErrorCode::MutexLockFailed => "Mutex failed",
            ErrorCode::InvalidValueType => "Invalid value type",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
