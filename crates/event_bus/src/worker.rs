//! Listener worker - one thread per subscription
//!
//! The worker drains the subscription queue in order and calls the listener
//! for each envelope, so a listener never sees two envelopes at once. Every
//! call runs under the slot gate after re-checking `active`, which is what
//! lets `unsubscribe` guarantee that no call starts once it has returned.
//!
//! Listener calls are synchronous and may block for as long as they like, so
//! each subscription owns a named OS thread. A stuck listener only ever holds
//! its own thread.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use contracts::SensorListener;
use tracing::{debug, error, instrument, warn};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::registry::{ListenerRegistry, Queued, Slot, Subscription};

thread_local! {
    /// Subscription whose listener is running on this thread
    static DISPATCHING: Cell<Option<Subscription>> = const { Cell::new(None) };
}

/// Whether the current thread is inside a call to this subscription's listener
pub(crate) fn is_dispatching(subscription: Subscription) -> bool {
    DISPATCHING.with(|current| current.get() == Some(subscription))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Continue,
    Inactive,
    Gone,
}

/// Spawn the worker thread of a subscription
pub(crate) fn spawn_worker<L>(
    slot: Arc<Slot>,
    listener: Weak<Mutex<L>>,
    rx: async_channel::Receiver<Queued>,
    diagnostics: Diagnostics,
    registry: Weak<ListenerRegistry>,
) -> std::io::Result<JoinHandle<()>>
where
    L: SensorListener + Send + ?Sized + 'static,
{
    thread::Builder::new()
        .name(format!("listener-{}", slot.name))
        .spawn(move || listener_worker(slot, listener, rx, diagnostics, registry))
}

#[instrument(
    name = "listener_worker_loop",
    skip_all,
    fields(listener = %slot.name, subscription = %slot.subscription)
)]
fn listener_worker<L>(
    slot: Arc<Slot>,
    listener: Weak<Mutex<L>>,
    rx: async_channel::Receiver<Queued>,
    diagnostics: Diagnostics,
    registry: Weak<ListenerRegistry>,
) where
    L: SensorListener + Send + ?Sized + 'static,
{
    debug!("Listener worker started");

    while let Ok(queued) = rx.recv_blocking() {
        slot.metrics.set_queue_len(rx.len());

        match deliver_one(&slot, &listener, &queued, &diagnostics) {
            Delivery::Continue => {}
            Delivery::Inactive => break,
            Delivery::Gone => {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(&slot.subscription);
                }
                slot.close();
                break;
            }
        }
    }

    debug!("Listener worker stopped");
}

fn deliver_one<L>(
    slot: &Slot,
    listener: &Weak<Mutex<L>>,
    queued: &Queued,
    diagnostics: &Diagnostics,
) -> Delivery
where
    L: SensorListener + ?Sized,
{
    let _gate = slot.lock_gate();
    if !slot.active.load(Ordering::Acquire) {
        return Delivery::Inactive;
    }

    let Some(listener) = listener.upgrade() else {
        slot.active.store(false, Ordering::Release);
        warn!(listener = %slot.name, "Listener dropped without unsubscribing");
        diagnostics.publish(Diagnostic::ListenerGone {
            listener: slot.name.clone(),
        });
        return Delivery::Gone;
    };

    let envelope = &queued.envelope;
    let previous = DISPATCHING.with(|current| current.replace(Some(slot.subscription)));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut listener = listener.lock().unwrap_or_else(PoisonError::into_inner);
        listener.on_envelope(envelope)
    }));
    DISPATCHING.with(|current| current.set(previous));

    let (message, panicked) = match outcome {
        Ok(Ok(())) => {
            slot.metrics.inc_delivered();
            observability::record_envelope_delivered(&slot.name);
            observability::record_delivery_latency_ms(
                &slot.name,
                queued.enqueued_at.elapsed().as_secs_f64() * 1000.0,
            );
            return Delivery::Continue;
        }
        Ok(Err(e)) => (e.to_string(), false),
        Err(payload) => (panic_message(payload.as_ref()), true),
    };

    // Continue processing - one failing call never stops the listener
    slot.metrics.inc_faults();
    observability::record_listener_fault(&slot.name, panicked);
    error!(
        listener = %slot.name,
        source_id = %envelope.source_id(),
        sequence = envelope.sequence(),
        kind = envelope.kind().as_str(),
        panicked,
        error = %message,
        "Listener call failed"
    );
    diagnostics.publish(Diagnostic::ListenerFault {
        listener: slot.name.clone(),
        source_id: envelope.source_id().clone(),
        sequence: envelope.sequence(),
        message,
        panicked,
    });
    Delivery::Continue
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}
