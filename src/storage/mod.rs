//! Storage Module
//!
//! Persists working sets as checksummed JSON generations.
//!
//! ## Responsibilities
//! - Name every file of an instance (`layout`)
//! - Load payloads with required/optional and hash policy (`loader`)
//! - Serialize and durably write payloads (`writer`)
//! - Flush, rotate, restore and recover generations (`manager`)
//!
//! ## File Format
//! ```text
//! kvs_{id}_{gen}.json   JSON object: key → value
//! kvs_{id}_{gen}.hash   ┌──────────────────────────────┐
//!                       │ Adler-32 of .json (4, BE)    │
//!                       └──────────────────────────────┘
//! kvs_{id}_default.json JSON object, no .hash
//! ```

mod layout;
mod loader;
mod writer;
mod manager;

pub use layout::{FileLayout, InstanceId, SnapshotId, MAX_SNAPSHOTS};
pub use loader::{load_map, NeedFile, VerifyHash};
pub use writer::{serialize_map, write_file_synced, EncodedSnapshot};
pub use manager::SnapshotManager;
