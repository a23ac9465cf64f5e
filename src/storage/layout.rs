//! On-disk naming for one KVS instance.

use std::fmt;
use std::path::{Path, PathBuf};

/// Number of history generations kept besides the current one
pub const MAX_SNAPSHOTS: usize = 3;

/// Numeric id of a store instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

impl InstanceId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }
}

impl From<usize> for InstanceId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation number: 0 is current, `1..=MAX_SNAPSHOTS` is history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(pub usize);

impl SnapshotId {
    /// The generation written by the most recent flush
    pub const CURRENT: SnapshotId = SnapshotId(0);

    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Whether this id can name a generation at all
    pub fn is_valid(self) -> bool {
        self.0 <= MAX_SNAPSHOTS
    }
}

impl From<usize> for SnapshotId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File paths of one instance
///
/// ```text
/// {root}/{process_name}/kvs_{id}_default.json
/// {root}/{process_name}/kvs_{id}_{generation}.json
/// {root}/{process_name}/kvs_{id}_{generation}.hash
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// `{root}/{process_name}`
    dir: PathBuf,
    process_name: String,
    instance_id: InstanceId,
}

impl FileLayout {
    pub fn new(root: &Path, process_name: &str, instance_id: InstanceId) -> Self {
        Self {
            dir: root.join(process_name),
            process_name: process_name.to_string(),
            instance_id,
        }
    }

    /// Directory holding every file of this instance
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// `kvs_{id}`
    pub fn prefix(&self) -> String {
        format!("kvs_{}", self.instance_id)
    }

    pub fn default_file(&self) -> PathBuf {
        self.dir.join(format!("{}_default.json", self.prefix()))
    }

    pub fn kvs_file(&self, snapshot: SnapshotId) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.prefix(), snapshot))
    }

    pub fn hash_file(&self, snapshot: SnapshotId) -> PathBuf {
        self.dir.join(format!("{}_{}.hash", self.prefix(), snapshot))
    }

    /// Staging file for the next generation-0 payload
    pub fn pending_kvs_file(&self) -> PathBuf {
        self.dir.join(format!("{}_0.json.tmp", self.prefix()))
    }

    /// Staging file for the next generation-0 hash
    pub fn pending_hash_file(&self) -> PathBuf {
        self.dir.join(format!("{}_0.hash.tmp", self.prefix()))
    }
}
