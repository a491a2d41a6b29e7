//! Event Store - the public API over persisted event instances.
//!
//! A single worker thread owns the [`EventCollection`]. Every operation is a
//! message to that thread, so storage is never touched from two places at
//! once no matter how many handles or caller threads exist. Blocking
//! operations wait for the reply; [`EventStore::get_last_matching_event`] is
//! queued immediately and resolves as a future.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::{broadcast, oneshot};

use crate::config::{BackendKind, StoreConfig};
use crate::core::{Address, ChainId};
use crate::error::{Error, Result};
use crate::events::instance::{EventInstance, EventInstanceValue};
use crate::events::predicate::EventPredicate;
use crate::events::subscription::{SubscriptionId, SubscriptionRegistry};
use crate::storage::{EventCollection, FileStore, InMemoryStore, RocksStore, StorageBackend};

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

type Reply<T> = SyncSender<Result<T>>;

/// Messages handled by the store worker
enum Command {
    Add {
        events: Vec<EventInstanceValue>,
        token_contract: Address,
        reply: Reply<usize>,
    },
    Delete {
        token_contract: Address,
        reply: Reply<usize>,
    },
    Matching {
        predicate: EventPredicate,
        reply: Reply<Option<EventInstance>>,
    },
    LastMatching {
        predicate: EventPredicate,
        reply: oneshot::Sender<Result<Option<EventInstanceValue>>>,
    },
    Count {
        reply: Reply<usize>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// WORKER
// ═══════════════════════════════════════════════════════════════════════════════

struct Worker<B: StorageBackend> {
    collection: EventCollection<B>,
    registry: Arc<SubscriptionRegistry>,
    open: Arc<AtomicBool>,
}

impl<B: StorageBackend> Worker<B> {
    fn run(self, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            self.handle(command);
        }
        tracing::debug!("Event store worker stopped");
    }

    fn handle(&self, command: Command) {
        match command {
            Command::Add {
                events,
                token_contract,
                reply,
            } => {
                let _ = reply.send(self.add(events, token_contract));
            }
            Command::Delete {
                token_contract,
                reply,
            } => {
                let _ = reply.send(self.delete(token_contract));
            }
            Command::Matching { predicate, reply } => {
                let _ = reply.send(self.collection.first(&predicate));
            }
            Command::LastMatching { predicate, reply } => {
                let result = if self.open.load(Ordering::SeqCst) {
                    self.last_matching(&predicate)
                } else {
                    Err(Error::StoreUnavailable)
                };
                if reply.send(result).is_err() {
                    tracing::debug!("Last-matching query dropped before completion");
                }
            }
            Command::Count { reply } => {
                let _ = reply.send(self.collection.count());
            }
        }
    }

    fn add(&self, events: Vec<EventInstanceValue>, token_contract: Address) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let instances = events
            .iter()
            .map(EventInstance::from_value)
            .collect::<Result<Vec<_>>>()
            .map_err(Error::into_write_failure)?;

        if let Err(e) = self.collection.upsert(&instances) {
            tracing::warn!(
                "Dropped batch of {} events for {}: {}",
                instances.len(),
                token_contract.short(),
                e
            );
            return Err(e.into_write_failure());
        }

        tracing::debug!(
            "Stored {} events for {}",
            instances.len(),
            token_contract.short()
        );

        self.registry.notify(&token_contract);
        Ok(instances.len())
    }

    fn delete(&self, token_contract: Address) -> Result<usize> {
        let predicate = EventPredicate::for_token_contract(token_contract);
        match self.collection.delete_matching(&predicate) {
            Ok(deleted) => {
                tracing::debug!("Deleted {} events for {}", deleted, token_contract.short());
                Ok(deleted)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to delete events for {}: {}",
                    token_contract.short(),
                    e
                );
                Err(e.into_write_failure())
            }
        }
    }

    fn last_matching(&self, predicate: &EventPredicate) -> Result<Option<EventInstanceValue>> {
        self.collection
            .last_by_block_number(predicate)?
            .map(|instance| instance.to_value())
            .transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

struct Inner {
    commands: Option<Sender<Command>>,
    open: Arc<AtomicBool>,
    registry: Arc<SubscriptionRegistry>,
    worker_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Queued async queries observe this and fail with StoreUnavailable
        self.open.store(false, Ordering::SeqCst);
        self.commands.take();

        let handle = self.worker.get_mut().ok().and_then(Option::take);
        if let Some(handle) = handle {
            // The last handle may be released by a subscriber on the worker itself
            if thread::current().id() != self.worker_id && handle.join().is_err() {
                tracing::warn!("Event store worker panicked");
            }
        }

        tracing::info!("Event store closed");
    }
}

/// Handle to an event store. Cloning is cheap; all clones share one worker,
/// which stops when the last clone is dropped.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<Inner>,
}

impl EventStore {
    /// Open a store as described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let backend: Box<dyn StorageBackend> = match config.backend {
            BackendKind::Memory => Box::new(InMemoryStore::new()),
            BackendKind::File => Box::new(FileStore::new(&config.data_dir)?),
            BackendKind::Rocks => open_rocks(&config.data_dir)?,
        };

        tracing::info!(
            "Opening {} event store at {}",
            config.backend,
            config.data_dir.display()
        );

        Self::spawn(backend, config.broadcast_capacity)
    }

    /// Ephemeral store, mostly for tests
    pub fn in_memory() -> Result<Self> {
        Self::with_backend(InMemoryStore::new())
    }

    /// Store over an already opened backend
    pub fn with_backend<B: StorageBackend + 'static>(backend: B) -> Result<Self> {
        Self::spawn(backend, StoreConfig::default().broadcast_capacity)
    }

    fn spawn<B: StorageBackend + 'static>(backend: B, broadcast_capacity: usize) -> Result<Self> {
        let (commands, receiver) = mpsc::channel();
        let open = Arc::new(AtomicBool::new(true));
        let registry = Arc::new(SubscriptionRegistry::new(broadcast_capacity));

        let worker = Worker {
            collection: EventCollection::new(backend),
            registry: Arc::clone(&registry),
            open: Arc::clone(&open),
        };

        let handle = thread::Builder::new()
            .name("event-store".into())
            .spawn(move || worker.run(receiver))
            .map_err(|e| Error::Internal(format!("Failed to spawn event store worker: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                commands: Some(commands),
                open,
                registry,
                worker_id: handle.thread().id(),
                worker: Mutex::new(Some(handle)),
            }),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Upsert `events` in one atomic batch, then notify subscribers with
    /// `token_contract`. An empty batch does nothing and notifies nobody.
    ///
    /// Returns the number of records written. On
    /// [`Error::WriteFailed`] nothing was applied and nobody was notified.
    pub fn add(&self, events: Vec<EventInstanceValue>, token_contract: Address) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        self.request(|reply| Command::Add {
            events,
            token_contract,
            reply,
        })
    }

    /// Delete every record of `token_contract`. Subscribers are not notified.
    pub fn delete_events(&self, token_contract: Address) -> Result<usize> {
        self.request(|reply| Command::Delete {
            token_contract,
            reply,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    /// The matching record with the highest block number.
    ///
    /// The query is queued when this is called; awaiting only collects the
    /// result. Resolves to [`Error::StoreUnavailable`] if the store is dropped
    /// before the query runs.
    pub fn get_last_matching_event(
        &self,
        contract: Address,
        token_contract: Address,
        chain: ChainId,
        event_name: &str,
    ) -> impl Future<Output = Result<Option<EventInstanceValue>>> + Send + 'static {
        let predicate = EventPredicate::matching_event(contract, token_contract, chain, event_name);
        let (reply, receiver) = oneshot::channel();
        let queued = self.send(Command::LastMatching { predicate, reply });

        async move {
            queued?;
            receiver.await.map_err(|_| Error::StoreUnavailable)?
        }
    }

    /// Any one record in the given filter slot
    pub fn get_matching_event(
        &self,
        contract: Address,
        token_contract: Address,
        chain: ChainId,
        event_name: &str,
        filter_name: &str,
        filter_value: &str,
    ) -> Result<Option<EventInstance>> {
        let predicate = EventPredicate::matching_event_with_filter(
            contract,
            token_contract,
            chain,
            event_name,
            filter_name,
            filter_value,
        );
        self.request(|reply| Command::Matching { predicate, reply })
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        self.request(|reply| Command::Count { reply })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SUBSCRIPTIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a callback for committed batches. Callbacks run on the store
    /// worker and hold up every other operation while they run, and they
    /// must not call blocking store operations (those fail with
    /// [`Error::ReentrantCall`]).
    ///
    /// The store owns its callbacks, so a callback that captures an
    /// `EventStore` clone keeps the store open forever. Capture a
    /// [`WeakEventStore`] from [`EventStore::downgrade`] instead.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(callback)
    }

    /// Remove a callback
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    /// Async stream of token contracts with newly committed events
    pub fn updates(&self) -> broadcast::Receiver<Address> {
        self.inner.registry.updates()
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Handle that does not keep the store open
    pub fn downgrade(&self) -> WeakEventStore {
        WeakEventStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PLUMBING
    // ═══════════════════════════════════════════════════════════════════════

    fn send(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .as_ref()
            .ok_or(Error::StoreUnavailable)?
            .send(command)
            .map_err(|_| Error::StoreUnavailable)
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        if thread::current().id() == self.inner.worker_id {
            return Err(Error::ReentrantCall);
        }

        let (reply, receiver) = mpsc::sync_channel(1);
        self.send(build(reply))?;
        receiver.recv().map_err(|_| Error::StoreUnavailable)?
    }
}

/// Non-owning [`EventStore`] handle for use inside subscriber callbacks
#[derive(Clone)]
pub struct WeakEventStore {
    inner: Weak<Inner>,
}

impl WeakEventStore {
    /// The store, unless every owning handle has been dropped
    pub fn upgrade(&self) -> Option<EventStore> {
        self.inner.upgrade().map(|inner| EventStore { inner })
    }
}

#[cfg(feature = "rocksdb-storage")]
fn open_rocks(data_dir: &Path) -> Result<Box<dyn StorageBackend>> {
    Ok(Box::new(RocksStore::open_default(data_dir)?))
}

#[cfg(not(feature = "rocksdb-storage"))]
fn open_rocks(data_dir: &Path) -> Result<Box<dyn StorageBackend>> {
    // The stub always refuses to open
    RocksStore::open_default(data_dir)?;
    Err(Error::Storage("RocksDB backend unavailable".into()))
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("open", &self.inner.open.load(Ordering::SeqCst))
            .field("registry", &self.inner.registry)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
