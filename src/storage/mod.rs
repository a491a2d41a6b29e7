//! Storage module for persistent data management.
//!
//! The store needs very little from persistence: prefix scans, and batches
//! that commit all-or-nothing. That contract is [`StorageBackend`];
//! [`EventCollection`] layers typed event instance access on top of it.
//!
//! ## Backends
//!
//! - **InMemoryStore**: Fast, ephemeral storage for testing
//! - **FileStore**: JSON file-based persistence
//! - **RocksStore**: Production-grade persistence using RocksDB
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_instances::storage::{EventCollection, InMemoryStore};
//!
//! let collection = EventCollection::new(InMemoryStore::new());
//! collection.upsert(&records)?;
//! ```

pub mod backend;
pub mod collection;
pub mod rocks;

pub use backend::*;
pub use collection::EventCollection;
pub use rocks::{column_families, RocksConfig, RocksStore};
