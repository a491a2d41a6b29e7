//! Storage backend implementations.
//!
//! This module provides the key/value contract the event collection needs and
//! two of its backends:
//! - InMemoryStore: Fast, ephemeral storage for testing
//! - FileStore: JSON file-based persistent storage
//!
//! Every backend must apply [`StorageBackend::write_batch`] all-or-nothing.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends.
///
/// The event collection mutates only through [`StorageBackend::write_batch`]
/// and reads through [`StorageBackend::scan_prefix`]. The single-key methods
/// serve tooling and tests; backends that buffer them (like [`FileStore`])
/// persist on `flush`.
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, StorageValue)>>;

    /// List all keys with a given prefix
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        Ok(self
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Apply every operation atomically, or none of them
    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<()>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Clear all data
    fn clear(&self) -> Result<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        (**self).delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, StorageValue)>> {
        (**self).scan_prefix(prefix)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        (**self).list_prefix(prefix)
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<()> {
        (**self).write_batch(operations)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Batch operation for atomic writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair, replacing any existing value
    Put {
        /// Key
        key: StorageKey,
        /// Value
        value: StorageValue,
    },
    /// Delete a key
    Delete {
        /// Key
        key: StorageKey,
    },
}

impl BatchOperation {
    /// Create a put operation
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a delete operation
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self::Delete { key: key.into() }
    }
}

fn apply_batch(data: &mut BTreeMap<StorageKey, StorageValue>, operations: Vec<BatchOperation>) {
    for op in operations {
        match op {
            BatchOperation::Put { key, value } => {
                data.insert(key, value);
            }
            BatchOperation::Delete { key } => {
                data.remove(&key);
            }
        }
    }
}

fn scan(
    data: &BTreeMap<StorageKey, StorageValue>,
    prefix: &[u8],
) -> Vec<(StorageKey, StorageValue)> {
    data.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn lock_error<E: std::fmt::Display>(e: E) -> Error {
    tracing::warn!("Storage lock poisoned: {}", e);
    Error::Lock
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend (for testing and ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<BTreeMap<StorageKey, StorageValue>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let data = self.data.read().map_err(lock_error)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().map_err(lock_error)?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut data = self.data.write().map_err(lock_error)?;
        Ok(data.remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, StorageValue)>> {
        let data = self.data.read().map_err(lock_error)?;
        Ok(scan(&data, prefix))
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<()> {
        let mut data = self.data.write().map_err(lock_error)?;
        apply_batch(&mut data, operations);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In-memory store doesn't need flushing
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.data.write().map_err(lock_error)?;
        data.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-based storage backend using JSON.
///
/// Single `set`/`delete` calls stay in the cache until [`flush`](StorageBackend::flush).
/// Batches are written through: the new contents go to a temporary file that
/// is renamed over the data file, and the cache only changes once that
/// succeeded.
#[derive(Debug)]
pub struct FileStore {
    /// Base directory for storage
    base_path: PathBuf,
    /// In-memory cache
    cache: RwLock<BTreeMap<StorageKey, StorageValue>>,
    /// Whether cache is dirty and needs flushing
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Create a new file store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                Error::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let store = Self {
            base_path,
            cache: RwLock::new(BTreeMap::new()),
            dirty: RwLock::new(false),
        };

        store.load_from_disk()?;

        Ok(store)
    }

    /// Path of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join("events.json")
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();

        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path).map_err(|e| {
            Error::Storage(format!("Failed to open data file: {}", e))
        })?;

        // Hex-encoded keys and values
        let data: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Deserialization(format!("Failed to parse data file: {}", e)))?;

        let mut cache = self.cache.write().map_err(lock_error)?;

        for (key_hex, value_hex) in data {
            let key = hex::decode(&key_hex).map_err(|e| {
                Error::Deserialization(format!("Invalid key in storage: {}", e))
            })?;
            let value = hex::decode(&value_hex).map_err(|e| {
                Error::Deserialization(format!("Invalid value in storage: {}", e))
            })?;
            cache.insert(key, value);
        }

        Ok(())
    }

    fn save_to_disk(&self, data: &BTreeMap<StorageKey, StorageValue>) -> Result<()> {
        let encoded: BTreeMap<String, String> = data
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let path = self.data_file_path();
        let tmp_path = path.with_extension("json.tmp");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| Error::Storage(format!("Failed to open data file for writing: {}", e)))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &encoded).map_err(|e| {
            Error::Storage(format!("Failed to write data file: {}", e))
        })?;
        writer
            .flush()
            .map_err(|e| Error::Storage(format!("Failed to write data file: {}", e)))?;

        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to replace data file: {}", e)))
    }

    fn mark_dirty(&self, value: bool) -> Result<()> {
        let mut dirty = self.dirty.write().map_err(lock_error)?;
        *dirty = value;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        {
            let mut cache = self.cache.write().map_err(lock_error)?;
            cache.insert(key.to_vec(), value.to_vec());
        }
        self.mark_dirty(true)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = {
            let mut cache = self.cache.write().map_err(lock_error)?;
            cache.remove(key).is_some()
        };

        if existed {
            self.mark_dirty(true)?;
        }

        Ok(existed)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, StorageValue)>> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(scan(&cache, prefix))
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<()> {
        let mut cache = self.cache.write().map_err(lock_error)?;

        let mut staged = cache.clone();
        apply_batch(&mut staged, operations);
        self.save_to_disk(&staged)?;

        *cache = staged;
        drop(cache);
        self.mark_dirty(false)
    }

    fn flush(&self) -> Result<()> {
        let dirty = *self.dirty.read().map_err(lock_error)?;
        if dirty {
            let cache = self.cache.read().map_err(lock_error)?;
            self.save_to_disk(&cache)?;
            drop(cache);
            self.mark_dirty(false)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        {
            let mut cache = self.cache.write().map_err(lock_error)?;
            cache.clear();
        }
        self.mark_dirty(true)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush {} on drop: {}", self.base_path.display(), e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Event instance records
    pub const EVENT: &[u8] = b"evt:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
