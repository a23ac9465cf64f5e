//! # SafeKVS
//!
//! A local, file-backed key-value store with:
//! - Typed JSON-compatible values
//! - A read-only default layer under the working set
//! - Adler-32 checked snapshot generations with bounded rotation
//! - A C ABI over flat, length-prefixed value buffers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Rust callers        C callers (ffi)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Kvs                                  │
//! │              (one Mutex per instance)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │   Overlay   │          │ SnapshotManager  │
//!   │ kvs/default │          │ gen 0..=MAX      │
//!   └─────────────┘          └────────┬─────────┘
//!                                     │
//!                                     ▼
//!                            ┌─────────────────┐
//!                            │ .json + .hash   │
//!                            │ (Adler-32)      │
//!                            └─────────────────┘
//! ```

#![deny(unsafe_code)]

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod checksum;
pub mod storage;
pub mod overlay;
pub mod kvs;
pub mod ffi;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorCode, KvsError, Result};
pub use config::{Config, OpenNeedDefaults, OpenNeedKvs};
pub use kvs::Kvs;
pub use storage::{InstanceId, SnapshotId, MAX_SNAPSHOTS};
pub use value::{KvsMap, KvsValue, KvsValueType, MAX_NESTING};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SafeKVS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
