//! KVS Module
//!
//! The public store that coordinates overlay and snapshot files.
//!
//! ## Responsibilities
//! - Load defaults and generation 0 on open
//! - Serve reads through the default overlay
//! - Flush, count and restore snapshots
//! - Flush once on drop when asked to

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::config::{Config, OpenNeedDefaults, OpenNeedKvs};
use crate::error::{KvsError, Result};
use crate::overlay::Overlay;
use crate::storage::{FileLayout, InstanceId, SnapshotId, SnapshotManager, MAX_SNAPSHOTS};
use crate::value::{KvsValue, MAX_NESTING};

/// State guarded by the store's lock
#[derive(Debug)]
struct KvsInner {
    /// Working set over defaults
    overlay: Overlay,

    /// Generation files of this instance
    snapshots: SnapshotManager,
}

/// A persistent key-value store instance
///
/// ## Concurrency Model
///
/// - One `Mutex` guards the working set, default set and file layout
/// - Every public operation holds it for its whole duration, including
///   the file I/O of flush and restore, so no mutation can interleave
///   with a serialization
/// - A poisoned lock is reported as `MutexLockFailed`; nothing is modified
///
/// `Kvs` is `Send + Sync`: share it across threads behind an `Arc`.
///
/// ## Lifecycle
///
/// Flush-on-exit starts enabled. Dropping the store then performs exactly
/// one flush; errors at that point can only be logged.
#[derive(Debug)]
pub struct Kvs {
    inner: Mutex<KvsInner>,

    /// Flush once when dropped
    flush_on_exit: AtomicBool,
}

impl Kvs {
    /// Open a store
    ///
    /// On open:
    /// 1. Complete any flush interrupted by a crash
    /// 2. Load the default file (never hash-checked)
    /// 3. Load generation 0 (always hash-checked)
    ///
    /// Either load failing fails the open; defaults are loaded first.
    pub fn open(config: Config) -> Result<Self> {
        let layout = FileLayout::new(&config.dir, &config.process_name, config.instance_id);

        // Step 1: Recover
        let snapshots = SnapshotManager::open(layout)?;

        // Step 2: Defaults
        let defaults = snapshots.load_defaults(config.need_defaults)?;

        // Step 3: Current generation
        let kvs = snapshots.load_generation(SnapshotId::CURRENT, config.need_kvs.into())?;

        info!(
            instance = %config.instance_id,
            process = %config.process_name,
            keys = kvs.len(),
            defaults = defaults.len(),
            max_snapshots = MAX_SNAPSHOTS,
            "Opened KVS"
        );

        Ok(Self {
            inner: Mutex::new(KvsInner {
                overlay: Overlay::new(kvs, defaults),
                snapshots,
            }),
            flush_on_exit: AtomicBool::new(true),
        })
    }

    /// Open with positional arguments (convenience method)
    pub fn open_in(
        dir: &Path,
        process_name: &str,
        instance_id: InstanceId,
        need_defaults: OpenNeedDefaults,
        need_kvs: OpenNeedKvs,
    ) -> Result<Self> {
        Self::open(
            Config::builder()
                .dir(dir)
                .process_name(process_name)
                .instance_id(instance_id)
                .need_defaults(need_defaults)
                .need_kvs(need_kvs)
                .build(),
        )
    }

    // =========================================================================
    // Flush-on-exit
    // =========================================================================

    /// Control whether dropping the store flushes it
    pub fn set_flush_on_exit(&self, flush: bool) {
        self.flush_on_exit.store(flush, Ordering::SeqCst);
    }

    pub fn flush_on_exit(&self) -> bool {
        self.flush_on_exit.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Key Operations
    // =========================================================================

    /// Clear the working set; every key falls back to its default
    pub fn reset(&self) -> Result<()> {
        self.lock()?.overlay.reset();
        Ok(())
    }

    /// Drop the stored value of a key that has a default
    pub fn reset_key(&self, key: &str) -> Result<()> {
        self.lock()?.overlay.reset_key(key)
    }

    /// Keys in the working set, sorted (default-only keys are excluded)
    pub fn get_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.overlay.keys())
    }

    /// Whether a key is in the working set
    pub fn key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.overlay.contains(key))
    }

    /// Get a value, falling back to its default
    pub fn get_value(&self, key: &str) -> Result<KvsValue> {
        self.lock()?.overlay.get(key)
    }

    /// Get a value converted to `T`
    ///
    /// Fails with `InvalidValueType` if the stored kind does not match.
    pub fn get_value_as<T>(&self, key: &str) -> Result<T>
    where
        T: TryFrom<KvsValue, Error = KvsError>,
    {
        T::try_from(self.get_value(key)?)
    }

    /// Get the default value of a key
    pub fn get_default_value(&self, key: &str) -> Result<KvsValue> {
        self.lock()?.overlay.get_default(key)
    }

    /// Whether a key is currently served from its default
    pub fn is_value_default(&self, key: &str) -> Result<bool> {
        self.lock()?.overlay.is_default(key)
    }

    /// Store a value in the working set
    ///
    /// Fails with `ConversionFailed` if the value nests deeper than
    /// `MAX_NESTING`.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<KvsValue>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let nesting = value.nesting();
        if nesting > MAX_NESTING {
            warn!(key = %key, nesting, "Value nests too deep to be stored");
            return Err(KvsError::ConversionFailed(format!(
                "value of key {:?} nests {} levels, at most {} can be stored",
                key, nesting, MAX_NESTING
            )));
        }

        self.lock()?.overlay.set(key, value);
        Ok(())
    }

    /// Remove a key from the working set
    pub fn remove_key(&self, key: &str) -> Result<()> {
        self.lock()?.overlay.remove(key).map(|_| ())
    }

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    /// Write the working set as generation 0, rotating older generations
    pub fn flush(&self) -> Result<()> {
        let inner = self.lock()?;
        inner.snapshots.flush(inner.overlay.working_set())
    }

    /// Number of history generations on disk
    pub fn snapshot_count(&self) -> usize {
        self.lock_unpoisoned().snapshots.snapshot_count()
    }

    /// Upper bound of `snapshot_count`
    pub fn max_snapshot_count() -> usize {
        SnapshotManager::max_snapshot_count()
    }

    /// Replace the working set with a stored generation
    ///
    /// Nothing changes unless the generation loads and verifies completely.
    pub fn snapshot_restore(&self, snapshot: SnapshotId) -> Result<()> {
        let mut inner = self.lock()?;
        let restored = inner.snapshots.restore(snapshot)?;
        inner.overlay.replace_working_set(restored);
        info!(snapshot = %snapshot, "Restored KVS snapshot");
        Ok(())
    }

    /// Payload file of a generation
    pub fn get_kvs_filename(&self, snapshot: SnapshotId) -> Result<PathBuf> {
        self.lock()?.snapshots.kvs_filename(snapshot)
    }

    /// Hash file of a generation
    pub fn get_hash_filename(&self, snapshot: SnapshotId) -> Result<PathBuf> {
        self.lock()?.snapshots.hash_filename(snapshot)
    }

    // =========================================================================
    // Ownership Transfer
    // =========================================================================

    /// Exchange the entire state of two live stores
    ///
    /// Contents, file identity and flush-on-exit flag all move. Locks are
    /// taken in address order so concurrent swaps cannot deadlock; swapping
    /// a store with itself does nothing.
    pub fn swap(&self, other: &Kvs) -> Result<()> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }

        let (first, second) = if (self as *const Kvs) < (other as *const Kvs) {
            (self, other)
        } else {
            (other, self)
        };
        let mut first_inner = first.lock()?;
        let mut second_inner = second.lock()?;
        std::mem::swap(&mut *first_inner, &mut *second_inner);

        let first_flag = first.flush_on_exit.load(Ordering::SeqCst);
        let second_flag = second.flush_on_exit.load(Ordering::SeqCst);
        first.flush_on_exit.store(second_flag, Ordering::SeqCst);
        second.flush_on_exit.store(first_flag, Ordering::SeqCst);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn instance_id(&self) -> InstanceId {
        self.lock_unpoisoned().snapshots.layout().instance_id()
    }

    pub fn process_name(&self) -> String {
        self.lock_unpoisoned().snapshots.layout().process_name().to_string()
    }

    /// Directory holding this instance's files
    pub fn dir(&self) -> PathBuf {
        self.lock_unpoisoned().snapshots.layout().dir().to_path_buf()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lock(&self) -> Result<MutexGuard<'_, KvsInner>> {
        self.inner
            .lock()
            .map_err(|e| KvsError::MutexLockFailed(format!("KVS lock poisoned: {}", e)))
    }

    /// For read-only metadata that a poisoned lock cannot have corrupted
    fn lock_unpoisoned(&self) -> MutexGuard<'_, KvsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Kvs {
    fn drop(&mut self) {
        if !self.flush_on_exit() {
            return;
        }
        if let Err(e) = self.flush() {
            error!(instance = %self.instance_id(), error = %e, "Flush on exit failed");
        }
    }
}
