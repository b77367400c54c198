//! Listener registry
//!
//! A slab of subscription slots behind a mutex, plus a copy-on-write snapshot
//! that dispatch iterates without holding the registry lock. Handles carry the
//! generation of the slot they were issued for, so a stale handle never
//! matches a later subscription that reuses the same slab key.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Instant;

use contracts::{BackpressurePolicy, SampleEnvelope};
use slab::Slab;
use tracing::trace;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::metrics::ListenerMetrics;

/// Handle identifying one registration of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    key: usize,
    generation: u64,
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.generation)
    }
}

/// Per-subscription overrides of the bus configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub queue_depth: Option<usize>,
    pub backpressure: Option<BackpressurePolicy>,
}

impl From<&contracts::ListenerConfig> for SubscriptionOptions {
    fn from(config: &contracts::ListenerConfig) -> Self {
        Self {
            queue_depth: config.queue_depth,
            backpressure: config.backpressure,
        }
    }
}

/// Queued envelope with its enqueue time
pub(crate) struct Queued {
    pub(crate) envelope: Arc<SampleEnvelope>,
    pub(crate) enqueued_at: Instant,
}

/// Shared state of one subscription
pub(crate) struct Slot {
    pub(crate) subscription: Subscription,
    pub(crate) name: String,
    /// Cleared by unsubscribe; checked under `gate` before every call
    pub(crate) active: AtomicBool,
    /// Held for the duration of a listener call
    pub(crate) gate: Mutex<()>,
    pub(crate) tx: async_channel::Sender<Queued>,
    pub(crate) policy: BackpressurePolicy,
    pub(crate) metrics: Arc<ListenerMetrics>,
}

impl Slot {
    /// Put an envelope on this listener's queue according to its policy
    pub(crate) fn enqueue(&self, envelope: Arc<SampleEnvelope>, diagnostics: &Diagnostics) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let queued = Queued {
            envelope,
            enqueued_at: Instant::now(),
        };

        match self.policy {
            BackpressurePolicy::Block => {
                if self.tx.send_blocking(queued).is_err() {
                    trace!(listener = %self.name, "queue closed, envelope discarded");
                    return;
                }
            }
            BackpressurePolicy::DropOldest => match self.tx.force_send(queued) {
                Ok(Some(evicted)) => {
                    self.metrics.inc_dropped();
                    observability::record_envelope_dropped(&self.name);
                    diagnostics.publish(Diagnostic::EnvelopeDropped {
                        listener: self.name.clone(),
                        source_id: evicted.envelope.source_id().clone(),
                        sequence: evicted.envelope.sequence(),
                    });
                }
                Ok(None) => {}
                Err(_) => {
                    trace!(listener = %self.name, "queue closed, envelope discarded");
                    return;
                }
            },
        }

        let len = self.tx.len();
        self.metrics.set_queue_len(len);
        observability::record_queue_depth(&self.name, len);
    }

    /// Stop accepting envelopes and wake a producer blocked on this queue
    pub(crate) fn close(&self) {
        self.tx.close();
    }

    pub(crate) fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Entry {
    slot: Arc<Slot>,
    /// `None` when the worker thread could not be spawned
    worker: Option<JoinHandle<()>>,
}

struct Inner {
    entries: Slab<Entry>,
    next_generation: u64,
}

/// Thread-safe map of subscriptions
pub(crate) struct ListenerRegistry {
    inner: Mutex<Inner>,
    snapshot: RwLock<Arc<[Arc<Slot>]>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Slab::new(),
                next_generation: 1,
            }),
            snapshot: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Insert a subscription whose slot and worker are built from its handle
    pub(crate) fn insert_with<F>(&self, build: F) -> Subscription
    where
        F: FnOnce(Subscription) -> (Arc<Slot>, Option<JoinHandle<()>>),
    {
        let mut inner = self.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let vacant = inner.entries.vacant_entry();
        let subscription = Subscription {
            key: vacant.key(),
            generation,
        };
        let (slot, worker) = build(subscription);
        vacant.insert(Entry { slot, worker });

        self.publish_snapshot(&inner);
        subscription
    }

    /// Remove a subscription, returning its slot the first time only
    pub(crate) fn remove(&self, subscription: &Subscription) -> Option<Arc<Slot>> {
        let mut inner = self.lock();
        let matches = inner
            .entries
            .get(subscription.key)
            .is_some_and(|entry| entry.slot.subscription == *subscription);
        if !matches {
            return None;
        }

        let entry = inner.entries.remove(subscription.key);
        self.publish_snapshot(&inner);
        // The worker exits on its own once the queue is closed; it is detached
        // here since unsubscribe may run on that very thread
        drop(entry.worker);
        Some(entry.slot)
    }

    /// Remove every subscription, handing back slots and workers
    pub(crate) fn drain(&self) -> Vec<(Arc<Slot>, Option<JoinHandle<()>>)> {
        let mut inner = self.lock();
        let drained = inner
            .entries
            .drain()
            .map(|entry| (entry.slot, entry.worker))
            .collect();
        self.publish_snapshot(&inner);
        drained
    }

    /// Stable view for one dispatch pass
    pub(crate) fn snapshot(&self) -> Arc<[Arc<Slot>]> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn publish_snapshot(&self, inner: &Inner) {
        let slots: Vec<Arc<Slot>> = inner
            .entries
            .iter()
            .map(|(_, entry)| Arc::clone(&entry.slot))
            .collect();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(slots);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ListenerRegistry {
    /// Workers keep their slot alive, so a bus dropped without `shutdown`
    /// closes the queues here; each worker drains what is left and exits
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in inner.entries.iter() {
            entry.slot.close();
        }
    }
}
