//! RocksDB storage backend for production persistence.
//!
//! Records live in their own column family; batches map onto a native
//! `WriteBatch`, so they commit atomically.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_instances::storage::rocks::{RocksStore, RocksConfig};
//!
//! let store = RocksStore::open("/path/to/db", RocksConfig::default())?;
//! store.write_batch(vec![BatchOperation::put(b"key".to_vec(), b"value".to_vec())])?;
//! ```

#[cfg(feature = "rocksdb-storage")]
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use std::path::Path;
#[cfg(feature = "rocksdb-storage")]
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
#[cfg(feature = "rocksdb-storage")]
use crate::storage::backend::{BatchOperation, StorageBackend, StorageKey, StorageValue};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for RocksDB storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksConfig {
    /// Create database if it doesn't exist
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Enable compression
    pub enable_compression: bool,
    /// Enable bloom filters
    pub enable_bloom_filters: bool,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024, // 16 MB
            enable_compression: true,
            enable_bloom_filters: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLUMN FAMILIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Column family names for data organization
pub mod column_families {
    /// Default column family (required by RocksDB)
    pub const DEFAULT: &str = "default";
    /// Event instance records
    pub const EVENT_INSTANCES: &str = "event_instances";

    /// Get all column family names
    pub fn all() -> Vec<&'static str> {
        vec![DEFAULT, EVENT_INSTANCES]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROCKSDB STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// RocksDB storage backend
#[cfg(feature = "rocksdb-storage")]
pub struct RocksStore {
    /// Database handle
    db: DB,
    /// Database path
    path: PathBuf,
}

#[cfg(feature = "rocksdb-storage")]
impl RocksStore {
    /// Open a RocksDB database
    pub fn open<P: AsRef<Path>>(path: P, config: RocksConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        if config.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = column_families::all()
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if config.enable_bloom_filters {
                    let mut block_opts = rocksdb::BlockBasedOptions::default();
                    block_opts.set_bloom_filter(10.0, false);
                    cf_opts.set_block_based_table_factory(&block_opts);
                }
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors).map_err(|e| {
            Error::Storage(format!("Failed to open RocksDB: {}", e))
        })?;

        tracing::info!("Opened RocksDB event store at {}", path.display());

        Ok(Self { db, path })
    }

    /// Open with default configuration
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, RocksConfig::default())
    }

    fn events_cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(column_families::EVENT_INSTANCES).ok_or_else(|| {
            Error::Storage(format!(
                "Column family '{}' not found",
                column_families::EVENT_INSTANCES
            ))
        })
    }

    /// Get database path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "rocksdb-storage")]
impl StorageBackend for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let cf = self.events_cf()?;
        self.db.get_cf(cf, key).map_err(|e| {
            Error::Storage(format!("RocksDB get error: {}", e))
        })
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.events_cf()?;
        self.db.put_cf(cf, key, value).map_err(|e| {
            Error::Storage(format!("RocksDB put error: {}", e))
        })
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let cf = self.events_cf()?;

        let exists = self.db.get_cf(cf, key).map_err(|e| {
            Error::Storage(format!("RocksDB get error: {}", e))
        })?.is_some();

        if exists {
            self.db.delete_cf(cf, key).map_err(|e| {
                Error::Storage(format!("RocksDB delete error: {}", e))
            })?;
        }

        Ok(exists)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, StorageValue)>> {
        let cf = self.events_cf()?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::Storage(format!("RocksDB iterator error: {}", e))
            })?;

            if !key.starts_with(prefix) {
                break;
            }

            entries.push((key.to_vec(), value.to_vec()));
        }

        Ok(entries)
    }

    fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<()> {
        let cf = self.events_cf()?;
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put_cf(cf, &key, &value),
                BatchOperation::Delete { key } => batch.delete_cf(cf, &key),
            }
        }

        self.db.write(batch).map_err(|e| {
            Error::Storage(format!("RocksDB batch write error: {}", e))
        })
    }

    fn flush(&self) -> Result<()> {
        let cf = self.events_cf()?;
        self.db.flush_cf(cf).map_err(|e| {
            Error::Storage(format!("RocksDB flush error: {}", e))
        })
    }

    fn clear(&self) -> Result<()> {
        let keys = self.list_prefix(&[])?;
        self.write_batch(keys.into_iter().map(BatchOperation::delete).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STUB IMPLEMENTATION (WHEN FEATURE DISABLED)
// ═══════════════════════════════════════════════════════════════════════════════

/// Stub implementation when RocksDB feature is disabled
#[cfg(not(feature = "rocksdb-storage"))]
#[derive(Debug)]
pub struct RocksStore;

#[cfg(not(feature = "rocksdb-storage"))]
impl RocksStore {
    /// Open (stub)
    pub fn open<P: AsRef<Path>>(_path: P, _config: RocksConfig) -> Result<Self> {
        Err(Error::Storage(
            "RocksDB feature not enabled. Rebuild with --features rocksdb-storage".into(),
        ))
    }

    /// Open with default config (stub)
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, RocksConfig::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_families() {
        let cfs = column_families::all();
        assert!(cfs.contains(&column_families::DEFAULT));
        assert!(cfs.contains(&column_families::EVENT_INSTANCES));
    }

    #[cfg(not(feature = "rocksdb-storage"))]
    #[test]
    fn test_stub_refuses_to_open() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RocksStore::open_default(temp_dir.path()),
            Err(Error::Storage(_))
        ));
    }

    #[cfg(feature = "rocksdb-storage")]
    #[test]
    fn test_rocks_store_basic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open_default(temp_dir.path()).unwrap();
        assert_eq!(store.path(), temp_dir.path());

        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        assert!(store.delete(b"key1").unwrap());
        assert_eq!(store.get(b"key1").unwrap(), None);
    }

    #[cfg(feature = "rocksdb-storage")]
    #[test]
    fn test_rocks_store_prefix_and_batch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open_default(temp_dir.path()).unwrap();

        store
            .write_batch(vec![
                BatchOperation::put(b"evt:1".to_vec(), b"a".to_vec()),
                BatchOperation::put(b"evt:2".to_vec(), b"b".to_vec()),
                BatchOperation::put(b"other".to_vec(), b"c".to_vec()),
            ])
            .unwrap();

        assert_eq!(store.scan_prefix(b"evt:").unwrap().len(), 2);

        store.clear().unwrap();
        assert!(store.list_prefix(b"").unwrap().is_empty());
    }
}
