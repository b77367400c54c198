//! EventBus - fan-out from sources to listeners
//!
//! Sources push envelopes through an emitter the bus hands them on `attach`.
//! The emitter runs on the producer's thread: it takes a registry snapshot and
//! puts the envelope on the bounded queue of every subscription, in
//! production order. One worker thread per subscription drains each queue, so
//! a listener that blocks never delays the others.
//!
//! Under [`BackpressurePolicy::Block`] a listener callback must not `stop` a
//! source whose emission is waiting for room in that listener's own queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use contracts::{
    BusConfig, ContractError, EnvelopeEmitter, Sample, SampleEnvelope, SensorListener,
    SensorSource, SourceId,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::BusError;
use crate::metrics::{ListenerMetrics, ListenerMetricsReport};
use crate::registry::{ListenerRegistry, Slot, Subscription, SubscriptionOptions};
use crate::worker::{is_dispatching, spawn_worker};

/// Handle identifying one attached source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(u64);

struct Attachment {
    source_id: SourceId,
    source: Weak<dyn SensorSource>,
    forwarding: Arc<AtomicBool>,
}

struct Shared {
    config: BusConfig,
    registry: Arc<ListenerRegistry>,
    diagnostics: Diagnostics,
    attachments: Mutex<HashMap<AttachmentId, Attachment>>,
    next_attachment: AtomicU64,
}

impl Shared {
    /// Fan one envelope out to every current subscription
    fn dispatch(&self, envelope: SampleEnvelope) {
        if let Sample::Error { message } = envelope.sample() {
            warn!(source_id = %envelope.source_id(), error = %message, "Source failed");
            self.diagnostics.publish(Diagnostic::SourceError {
                source_id: envelope.source_id().clone(),
                message: message.clone(),
            });
        }

        let envelope = Arc::new(envelope);
        for slot in self.registry.snapshot().iter() {
            slot.enqueue(Arc::clone(&envelope), &self.diagnostics);
        }
    }

    fn attachments(&self) -> MutexGuard<'_, HashMap<AttachmentId, Attachment>> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for creating an EventBus
pub struct EventBusBuilder {
    config: BusConfig,
    runtime: Option<Handle>,
}

impl EventBusBuilder {
    /// Run workers on this runtime instead of the current one
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the bus
    ///
    /// # Errors
    /// `NoRuntime` when no handle was given and the caller is not inside a
    /// tokio runtime.
    #[instrument(name = "event_bus_build", skip(self))]
    pub fn build(self) -> Result<EventBus, BusError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BusError::NoRuntime)?,
        };

        let diagnostics = Diagnostics::new(self.config.diagnostics_capacity);
        info!(
            queue_depth = self.config.queue_depth,
            backpressure = ?self.config.backpressure,
            "EventBus created"
        );

        Ok(EventBus {
            shared: Arc::new(Shared {
                config: self.config,
                registry: Arc::new(ListenerRegistry::new()),
                diagnostics,
                attachments: Mutex::new(HashMap::new()),
                next_attachment: AtomicU64::new(1),
            }),
            runtime,
        })
    }
}

/// The sensor event bus
pub struct EventBus {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl EventBus {
    pub fn builder(config: BusConfig) -> EventBusBuilder {
        EventBusBuilder {
            config,
            runtime: None,
        }
    }

    /// Bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Register a listener with the bus defaults
    ///
    /// The bus keeps only a weak reference; dropping the listener without
    /// unsubscribing ends the subscription with a `ListenerGone` diagnostic.
    pub fn subscribe<L>(&self, listener: &Arc<Mutex<L>>) -> Subscription
    where
        L: SensorListener + Send + ?Sized + 'static,
    {
        self.subscribe_with(listener, SubscriptionOptions::default())
    }

    /// Register a listener with its own queue depth or back-pressure policy
    ///
    /// Registering the same listener twice yields two independent
    /// subscriptions. If the worker thread cannot be spawned the handle is
    /// returned already inactive and the failure is logged.
    #[instrument(name = "event_bus_subscribe", skip_all)]
    pub fn subscribe_with<L>(
        &self,
        listener: &Arc<Mutex<L>>,
        options: SubscriptionOptions,
    ) -> Subscription
    where
        L: SensorListener + Send + ?Sized + 'static,
    {
        let name = listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name()
            .to_string();
        let depth = options
            .queue_depth
            .unwrap_or(self.shared.config.queue_depth)
            .max(1);
        let policy = options
            .backpressure
            .unwrap_or(self.shared.config.backpressure);

        let shared = &self.shared;
        let subscription = shared.registry.insert_with(|subscription| {
            let (tx, rx) = async_channel::bounded(depth);
            let slot = Arc::new(Slot {
                subscription,
                name: name.clone(),
                active: AtomicBool::new(true),
                gate: Mutex::new(()),
                tx,
                policy,
                metrics: Arc::new(ListenerMetrics::new()),
            });
            let worker = match spawn_worker(
                Arc::clone(&slot),
                Arc::downgrade(listener),
                rx,
                shared.diagnostics.clone(),
                Arc::downgrade(&shared.registry),
            ) {
                Ok(worker) => Some(worker),
                Err(e) => {
                    error!(listener = %name, error = %e, "Failed to spawn listener worker");
                    slot.active.store(false, Ordering::Release);
                    slot.close();
                    None
                }
            };
            (slot, worker)
        });

        debug!(
            listener = %name,
            %subscription,
            queue_depth = depth,
            backpressure = ?policy,
            "Listener subscribed"
        );
        subscription
    }

    /// Remove a subscription
    ///
    /// Returns `true` only the first time. Once this returns no further call
    /// to the listener starts; a call already in progress is waited for,
    /// unless this is invoked from inside that call.
    #[instrument(name = "event_bus_unsubscribe", skip_all, fields(subscription = %subscription))]
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let Some(slot) = self.shared.registry.remove(subscription) else {
            return false;
        };

        slot.active.store(false, Ordering::Release);
        slot.close();
        if !is_dispatching(*subscription) {
            drop(slot.lock_gate());
        }

        debug!(listener = %slot.name, "Listener unsubscribed");
        true
    }

    /// Start a source and forward its envelopes into the bus
    ///
    /// The bus holds the source weakly; it is not stopped by `detach`, only by
    /// `shutdown` if still alive.
    ///
    /// # Errors
    /// Whatever `SensorSource::start` returns (`AlreadyStarted`,
    /// `DeviceUnavailable`).
    #[instrument(name = "event_bus_attach", skip_all, fields(source_id = %source.source_id()))]
    pub fn attach(&self, source: Arc<dyn SensorSource>) -> Result<AttachmentId, ContractError> {
        let id = AttachmentId(self.shared.next_attachment.fetch_add(1, Ordering::Relaxed));
        let forwarding = Arc::new(AtomicBool::new(true));

        let shared = Arc::downgrade(&self.shared);
        let gate = Arc::clone(&forwarding);
        let emitter: EnvelopeEmitter = Arc::new(move |envelope| {
            if !gate.load(Ordering::Acquire) {
                return;
            }
            if let Some(shared) = shared.upgrade() {
                shared.dispatch(envelope);
            }
        });

        self.shared.attachments().insert(
            id,
            Attachment {
                source_id: source.source_id().clone(),
                source: Arc::downgrade(&source),
                forwarding,
            },
        );

        if let Err(e) = source.start(emitter) {
            self.shared.attachments().remove(&id);
            warn!(source_id = %source.source_id(), error = %e, "Source failed to start");
            return Err(e);
        }

        info!(source_id = %source.source_id(), "Source attached");
        Ok(id)
    }

    /// Stop forwarding envelopes from a source without stopping it
    pub fn detach(&self, id: AttachmentId) -> bool {
        match self.shared.attachments().remove(&id) {
            Some(attachment) => {
                attachment.forwarding.store(false, Ordering::Release);
                debug!(source_id = %attachment.source_id, "Source detached");
                true
            }
            None => false,
        }
    }

    /// Receive isolated faults
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.shared.diagnostics.subscribe()
    }

    /// Metrics of every live subscription
    pub fn metrics(&self) -> Vec<ListenerMetricsReport> {
        self.shared
            .registry
            .snapshot()
            .iter()
            .map(|slot| ListenerMetricsReport {
                subscription: slot.subscription,
                listener: slot.name.clone(),
                metrics: slot.metrics.snapshot(),
            })
            .collect()
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Number of attached sources
    pub fn attachment_count(&self) -> usize {
        self.shared.attachments().len()
    }

    /// Stop attached sources, drain every queue and wait for the workers
    #[instrument(name = "event_bus_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let attachments: Vec<Attachment> = self
            .shared
            .attachments()
            .drain()
            .map(|(_, attachment)| attachment)
            .collect();

        for attachment in attachments {
            let Some(source) = attachment.source.upgrade() else {
                continue;
            };
            // stop joins the producer thread
            if let Err(e) = self.runtime.spawn_blocking(move || source.stop()).await {
                error!(source_id = %attachment.source_id, error = ?e, "Source stop panicked");
            }
            attachment.forwarding.store(false, Ordering::Release);
        }

        let workers = self.shared.registry.drain();
        for (slot, _) in &workers {
            slot.close();
        }
        for (slot, worker) in workers {
            let Some(worker) = worker else {
                continue;
            };
            match self.runtime.spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => error!(listener = %slot.name, "Worker thread panicked"),
                Err(e) => error!(listener = %slot.name, error = ?e, "Worker join failed"),
            }
        }

        info!("EventBus shutdown complete");
    }
}
