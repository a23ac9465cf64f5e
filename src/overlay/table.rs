//! Overlay implementation
//!
//! Plain maps, no locking: the owning `Kvs` serializes all access.

use crate::error::{KvsError, Result};
use crate::value::{KvsMap, KvsValue};

use super::ValueSource;

/// Working set layered over the default set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Mutable key → value mapping (what gets flushed)
    kvs: KvsMap,

    /// Immutable fallback values
    defaults: KvsMap,
}

impl Overlay {
    pub fn new(kvs: KvsMap, defaults: KvsMap) -> Self {
        Self { kvs, defaults }
    }

    /// Look up a key in both layers, reporting which one served it
    pub fn lookup(&self, key: &str) -> Option<(&KvsValue, ValueSource)> {
        if let Some(value) = self.kvs.get(key) {
            return Some((value, ValueSource::Stored));
        }
        self.defaults
            .get(key)
            .map(|value| (value, ValueSource::Default))
    }

    /// Value for `key`, falling back to its default
    pub fn get(&self, key: &str) -> Result<KvsValue> {
        self.lookup(key)
            .map(|(value, _)| value.clone())
            .ok_or_else(|| KvsError::KeyNotFound(key.to_string()))
    }

    /// Default value for `key`, ignoring the working set
    pub fn get_default(&self, key: &str) -> Result<KvsValue> {
        self.defaults
            .get(key)
            .cloned()
            .ok_or_else(|| KvsError::KeyNotFound(key.to_string()))
    }

    /// Whether `key` is currently served from the default set
    pub fn is_default(&self, key: &str) -> Result<bool> {
        match self.lookup(key) {
            Some((_, source)) => Ok(source == ValueSource::Default),
            None => Err(KvsError::KeyNotFound(key.to_string())),
        }
    }

    /// Whether `key` is in the working set
    pub fn contains(&self, key: &str) -> bool {
        self.kvs.contains_key(key)
    }

    /// Working-set keys, sorted
    ///
    /// Keys that only have a default are not listed.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.kvs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Store a value, returning the previous working-set value
    pub fn set(&mut self, key: String, value: KvsValue) -> Option<KvsValue> {
        self.kvs.insert(key, value)
    }

    /// Remove a key from the working set
    ///
    /// A default for the key, if any, becomes visible again.
    pub fn remove(&mut self, key: &str) -> Result<KvsValue> {
        self.kvs
            .remove(key)
            .ok_or_else(|| KvsError::KeyNotFound(key.to_string()))
    }

    /// Drop the override for a key that has a default
    pub fn reset_key(&mut self, key: &str) -> Result<()> {
        if !self.defaults.contains_key(key) {
            return Err(KvsError::KeyDefaultNotFound(key.to_string()));
        }
        self.kvs.remove(key);
        Ok(())
    }

    /// Clear the working set
    pub fn reset(&mut self) {
        self.kvs.clear();
    }

    pub fn working_set(&self) -> &KvsMap {
        &self.kvs
    }

    pub fn defaults(&self) -> &KvsMap {
        &self.defaults
    }

    /// Swap in a whole new working set, returning the old one
    pub fn replace_working_set(&mut self, kvs: KvsMap) -> KvsMap {
        std::mem::replace(&mut self.kvs, kvs)
    }

    pub fn len(&self) -> usize {
        self.kvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kvs.is_empty()
    }
}
