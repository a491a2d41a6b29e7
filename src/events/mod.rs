//! Event instance storage.
//!
//! Records of observed smart-contract events, keyed by the contract that
//! emitted them and the token contract they belong to, with a notification
//! fan-out whenever a token contract receives new records.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        EventStore                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  callers ──commands──▶ worker thread ──▶ EventCollection     │
//! │                              │                               │
//! │                              └──▶ SubscriptionRegistry       │
//! │                                   (callbacks + broadcast)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_instances::prelude::*;
//!
//! let store = EventStore::in_memory()?;
//! store.subscribe(|token| println!("new events for {}", token));
//!
//! store.add(events, token_contract)?;
//! let last = store
//!     .get_last_matching_event(contract, token_contract, ChainId::MAINNET, "Transfer")
//!     .await?;
//! ```

pub mod instance;
pub mod predicate;
pub mod store;
pub mod subscription;

pub use instance::{EventData, EventInstance, EventInstanceValue, FilterSlot};
pub use predicate::{Clause, EventPredicate};
pub use store::{EventStore, WeakEventStore};
pub use subscription::{Subscriber, SubscriptionId, SubscriptionRegistry};
