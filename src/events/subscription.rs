//! Subscription registry for "events arrived" notifications.
//!
//! Callbacks receive the token contract whose events were just committed.
//! They are called in registration order on the notifying thread; a panicking
//! callback is logged and skipped. Async consumers can take a broadcast
//! receiver from [`SubscriptionRegistry::updates`] instead.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::core::Address;

/// Callback invoked with the token contract that received new events
pub type Subscriber = Arc<dyn Fn(&Address) + Send + Sync>;

/// Handle identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw id value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of subscribers
pub struct SubscriptionRegistry {
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
    broadcaster: broadcast::Sender<Address>,
}

impl SubscriptionRegistry {
    /// Create a registry whose broadcast channel buffers `capacity` updates
    pub fn new(capacity: usize) -> Self {
        let (broadcaster, _) = broadcast::channel(capacity.max(1));
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            broadcaster,
        }
    }

    /// Register a callback. Safe to call from inside another callback; the
    /// new subscriber starts with the next notification.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        tracing::debug!("Registered subscriber {}", id);
        id
    }

    /// Remove a registration; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    /// Async stream of token contracts with new events
    pub fn updates(&self) -> broadcast::Receiver<Address> {
        self.broadcaster.subscribe()
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `token_contract` to every callback, then to broadcast
    /// receivers. Returns how many callbacks completed without panicking.
    pub fn notify(&self, token_contract: &Address) -> usize {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let snapshot: Vec<(SubscriptionId, Subscriber)> = self.lock().clone();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(token_contract))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::warn!(
                        "Subscriber {} panicked while handling {}: {}",
                        id,
                        token_contract.short(),
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        // No receivers is not an error
        let _ = self.broadcaster.send(*token_contract);

        delivered
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        // Callbacks never run under this lock, so poisoning cannot leave the
        // list half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &self.len())
            .field("receivers", &self.broadcaster.receiver_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
