//! # Event Instances
//!
//! Persistent store of observed smart-contract events for an on-chain
//! indexer.
//!
//! ## Architecture
//!
//! - **Core**: Address and chain identifier types
//! - **Events**: Records, query predicates, the store and its subscriptions
//! - **Storage**: Byte-level backends (memory, JSON file, RocksDB) and the
//!   typed event collection over them
//! - **Config**: Backend selection from a file or the environment
//!
//! ## Example
//!
//! ```rust,ignore
//! use event_instances::prelude::*;
//!
//! let store = EventStore::open(&StoreConfig::from_env()?)?;
//! store.add(vec![value], token_contract)?;
//!
//! let latest = store
//!     .get_last_matching_event(contract, token_contract, ChainId::MAINNET, "Transfer")
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BackendKind, StoreConfig};
    pub use crate::core::{Address, ChainId};
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        EventData, EventInstance, EventInstanceValue, EventPredicate, EventStore, FilterSlot,
        SubscriptionId, WeakEventStore,
    };
    pub use crate::storage::{FileStore, InMemoryStore, StorageBackend};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
