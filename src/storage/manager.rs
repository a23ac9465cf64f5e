//! Snapshot Manager
//!
//! Owns the generation files of one instance.
//!
//! ## Responsibilities
//! - Load the default file and any generation
//! - Flush a working set as the new generation 0, rotating history
//! - Keep at most `MAX_SNAPSHOTS` history generations
//! - Finish a flush that was interrupted by a crash
//!
//! ## Flush Ordering
//! ```text
//! 1. write kvs_N_0.json.tmp + kvs_N_0.hash.tmp (synced)
//! 2. rotate: drop gen MAX, then gen k → gen k+1 for k = MAX-1 .. 0
//! 3. rename tmp payload → kvs_N_0.json, tmp hash → kvs_N_0.hash
//! ```
//! Existing generations are only touched once the new one is fully on disk,
//! so on open an interrupted flush is either completed (staged pair intact)
//! or discarded (staging incomplete).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::checksum;
use crate::config::{OpenNeedDefaults, OpenNeedKvs};
use crate::error::{KvsError, Result};
use crate::value::KvsMap;

use super::layout::{FileLayout, SnapshotId, MAX_SNAPSHOTS};
use super::loader::{load_map, NeedFile, VerifyHash};
use super::writer::{write_file_synced, EncodedSnapshot};

impl From<OpenNeedDefaults> for NeedFile {
    fn from(need: OpenNeedDefaults) -> Self {
        match need {
            OpenNeedDefaults::Optional => NeedFile::Optional,
            OpenNeedDefaults::Required => NeedFile::Required,
        }
    }
}

impl From<OpenNeedKvs> for NeedFile {
    fn from(need: OpenNeedKvs) -> Self {
        match need {
            OpenNeedKvs::Optional => NeedFile::Optional,
            OpenNeedKvs::Required => NeedFile::Required,
        }
    }
}

/// Manages the snapshot files of one instance
///
/// Holds no file handles: every operation opens what it needs, so the
/// manager is cheap to move and swap between stores.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    layout: FileLayout,
}

impl SnapshotManager {
    /// Create a manager without touching the filesystem
    pub fn new(layout: FileLayout) -> Self {
        Self { layout }
    }

    /// Create a manager and complete any interrupted flush
    pub fn open(layout: FileLayout) -> Result<Self> {
        let manager = Self::new(layout);
        if manager.layout.dir().is_dir() {
            manager.recover_interrupted_flush()?;
        }
        Ok(manager)
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Load the default set (never hash-verified)
    pub fn load_defaults(&self, need: OpenNeedDefaults) -> Result<KvsMap> {
        let path = self.layout.default_file();
        // The default file has no sidecar; the hash path is never read
        load_map(&path, &path, need.into(), VerifyHash::No)
    }

    /// Load one generation with mandatory hash verification
    pub fn load_generation(&self, snapshot: SnapshotId, need: NeedFile) -> Result<KvsMap> {
        load_map(
            &self.layout.kvs_file(snapshot),
            &self.layout.hash_file(snapshot),
            need,
            VerifyHash::Yes,
        )
    }

    /// Write `map` as the new generation 0, shifting history by one
    pub fn flush(&self, map: &KvsMap) -> Result<()> {
        // Step 1: Serialize and checksum before touching any file
        let encoded = EncodedSnapshot::encode(map)?;

        // Step 2: Stage the new generation
        fs::create_dir_all(self.layout.dir())?;
        let pending_kvs = self.layout.pending_kvs_file();
        let pending_hash = self.layout.pending_hash_file();
        write_file_synced(&pending_kvs, &encoded.payload)?;
        write_file_synced(&pending_hash, &encoded.hash)?;

        // Step 3: Rotate history
        self.rotate()?;

        // Step 4: Promote the staged files to generation 0
        fs::rename(&pending_kvs, self.layout.kvs_file(SnapshotId::CURRENT))?;
        fs::rename(&pending_hash, self.layout.hash_file(SnapshotId::CURRENT))?;

        debug!(
            instance = %self.layout.instance_id(),
            keys = map.len(),
            bytes = encoded.payload.len(),
            hash = %format!("{:#010x}", u32::from_be_bytes(encoded.hash)),
            "Flushed KVS"
        );
        Ok(())
    }

    /// Number of history generations present, counted from generation 1
    pub fn snapshot_count(&self) -> usize {
        (1..=MAX_SNAPSHOTS)
            .take_while(|&idx| self.layout.kvs_file(SnapshotId(idx)).exists())
            .count()
    }

    pub fn max_snapshot_count() -> usize {
        MAX_SNAPSHOTS
    }

    /// Load a generation for restore
    ///
    /// Loaded exactly like generation 0 at open, except the file is
    /// always required.
    pub fn restore(&self, snapshot: SnapshotId) -> Result<KvsMap> {
        if !snapshot.is_valid() {
            return Err(KvsError::InvalidSnapshotId(snapshot.0));
        }
        self.load_generation(snapshot, NeedFile::Required)
    }

    /// Path of an existing generation's payload
    pub fn kvs_filename(&self, snapshot: SnapshotId) -> Result<PathBuf> {
        if !snapshot.is_valid() {
            return Err(KvsError::InvalidSnapshotId(snapshot.0));
        }
        Self::existing(self.layout.kvs_file(snapshot))
    }

    /// Path of an existing generation's hash sidecar
    pub fn hash_filename(&self, snapshot: SnapshotId) -> Result<PathBuf> {
        if !snapshot.is_valid() {
            return Err(KvsError::InvalidSnapshotId(snapshot.0));
        }
        Self::existing(self.layout.hash_file(snapshot))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn existing(path: PathBuf) -> Result<PathBuf> {
        if path.exists() {
            Ok(path)
        } else {
            Err(KvsError::FileNotFound(path))
        }
    }

    /// Shift every generation up by one, evicting the oldest
    fn rotate(&self) -> Result<()> {
        let oldest = SnapshotId(MAX_SNAPSHOTS);
        remove_if_exists(&self.layout.kvs_file(oldest))?;
        remove_if_exists(&self.layout.hash_file(oldest))?;

        for idx in (0..MAX_SNAPSHOTS).rev() {
            let from = SnapshotId(idx);
            let to = SnapshotId(idx + 1);
            rename_if_exists(&self.layout.kvs_file(from), &self.layout.kvs_file(to))?;
            rename_if_exists(&self.layout.hash_file(from), &self.layout.hash_file(to))?;
        }
        Ok(())
    }

    /// Finish a rotation that may have stopped at any step
    ///
    /// Generations are contiguous from 0 before a rotation and each step
    /// empties the slot it moves from, so the first generation missing a
    /// file is where shifting has to continue.
    fn resume_rotation(&self) -> Result<()> {
        let first_gap = (0..=MAX_SNAPSHOTS).find(|&idx| {
            let snapshot = SnapshotId(idx);
            !self.layout.kvs_file(snapshot).exists() || !self.layout.hash_file(snapshot).exists()
        });

        let start = match first_gap {
            Some(idx) if idx < MAX_SNAPSHOTS => idx,
            // Nothing has moved yet
            _ => return self.rotate(),
        };

        for idx in (0..=start).rev() {
            let from = SnapshotId(idx);
            let to = SnapshotId(idx + 1);
            rename_if_exists(&self.layout.kvs_file(from), &self.layout.kvs_file(to))?;
            rename_if_exists(&self.layout.hash_file(from), &self.layout.hash_file(to))?;
        }
        Ok(())
    }

    /// Complete or discard a flush that stopped part way
    fn recover_interrupted_flush(&self) -> Result<()> {
        let pending_kvs = self.layout.pending_kvs_file();
        let pending_hash = self.layout.pending_hash_file();
        let current_kvs = self.layout.kvs_file(SnapshotId::CURRENT);
        let current_hash = self.layout.hash_file(SnapshotId::CURRENT);

        match (pending_kvs.exists(), pending_hash.exists()) {
            (false, false) => {}

            // Staged pair present: rotation may have started
            (true, true) => {
                if self.staged_pair_is_valid(&pending_kvs, &pending_hash) {
                    warn!(instance = %self.layout.instance_id(), "Completing interrupted flush");
                    self.resume_rotation()?;
                    fs::rename(&pending_kvs, &current_kvs)?;
                    fs::rename(&pending_hash, &current_hash)?;
                } else {
                    warn!(instance = %self.layout.instance_id(), "Discarding incomplete staged flush");
                    remove_if_exists(&pending_kvs)?;
                    remove_if_exists(&pending_hash)?;
                }
            }

            // Payload already promoted, hash still staged
            (false, true) => {
                let matches = fs::read(&current_kvs)
                    .ok()
                    .zip(fs::read(&pending_hash).ok())
                    .and_then(|(data, raw)| {
                        let stored = checksum::decode_hash(&raw, &pending_hash).ok()?;
                        Some(checksum::adler32(&data) == stored)
                    })
                    .unwrap_or(false);

                if matches {
                    warn!(instance = %self.layout.instance_id(), "Completing interrupted hash promotion");
                    fs::rename(&pending_hash, &current_hash)?;
                } else {
                    warn!(instance = %self.layout.instance_id(), "Discarding orphaned staged hash");
                    remove_if_exists(&pending_hash)?;
                }
            }

            // Crashed while staging: existing generations are untouched
            (true, false) => {
                warn!(instance = %self.layout.instance_id(), "Discarding partially staged payload");
                remove_if_exists(&pending_kvs)?;
            }
        }
        Ok(())
    }

    fn staged_pair_is_valid(&self, payload: &Path, hash: &Path) -> bool {
        let (Ok(data), Ok(raw)) = (fs::read(payload), fs::read(hash)) else {
            return false;
        };
        match checksum::decode_hash(&raw, hash) {
            Ok(stored) => checksum::verify(&data, stored, payload).is_ok(),
            Err(_) => false,
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn rename_if_exists(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
