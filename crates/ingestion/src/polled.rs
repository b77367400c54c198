//! Polled source - drives a [`SampleDevice`] on a dedicated producer thread
//!
//! Implements `SensorSource` for any device. The producer thread owns the
//! device through a guard whose `Drop` closes it, so the device is released
//! when the thread ends for any reason: `stop`, device loss, or a panicking
//! driver.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use contracts::{
    ConnectionState, ContractError, EnvelopeEmitter, Sample, SensorSource, SourceId, SourceState,
};
use tracing::{debug, error, instrument, warn};

use crate::device::{DevicePoll, SampleDevice};
use crate::lifecycle::SourceLifecycle;
use crate::metrics::SourceMetrics;

/// Releases the device when the producer thread ends
struct DeviceGuard<D: SampleDevice> {
    device: D,
    source_id: SourceId,
}

impl<D: SampleDevice> Drop for DeviceGuard<D> {
    fn drop(&mut self) {
        self.device.close();
        debug!(source_id = %self.source_id, "device released");
    }
}

/// Sensor source backed by a polled device
pub struct PolledSource<D: SampleDevice> {
    lifecycle: Arc<SourceLifecycle>,
    device: Mutex<Option<D>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<D: SampleDevice> PolledSource<D> {
    /// Create a source; the device is not opened until `start`
    pub fn new(source_id: impl Into<SourceId>, device: D) -> Self {
        Self {
            lifecycle: Arc::new(SourceLifecycle::new(source_id.into())),
            device: Mutex::new(Some(device)),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Emission counters
    pub fn metrics(&self) -> Arc<SourceMetrics> {
        self.lifecycle.metrics()
    }

    fn spawn_producer(&self, guard: DeviceGuard<D>) -> std::io::Result<JoinHandle<()>> {
        let lifecycle = Arc::clone(&self.lifecycle);
        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name(format!("source-{}", self.lifecycle.source_id()))
            .spawn(move || run_producer(guard, &lifecycle, &running))
    }
}

impl<D: SampleDevice> SensorSource for PolledSource<D> {
    fn source_id(&self) -> &SourceId {
        self.lifecycle.source_id()
    }

    #[instrument(
        name = "polled_source_start",
        skip(self, emitter),
        fields(source_id = %self.lifecycle.source_id())
    )]
    fn start(&self, emitter: EnvelopeEmitter) -> Result<(), ContractError> {
        let source_id = self.lifecycle.source_id().clone();
        self.lifecycle.begin_start(emitter)?;

        let mut slot = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut device) = slot.take() else {
            self.lifecycle.abort_start();
            return Err(ContractError::already_started(&source_id));
        };

        if let Err(e) = device.open() {
            *slot = Some(device);
            self.lifecycle.abort_start();
            warn!(source_id = %source_id, error = %e, "device unavailable");
            return Err(match e {
                e @ ContractError::DeviceUnavailable { .. } => e,
                other => ContractError::device_unavailable(&source_id, other.to_string()),
            });
        }
        drop(slot);

        self.running.store(true, Ordering::Release);
        self.lifecycle.commit_start();

        let guard = DeviceGuard {
            device,
            source_id: source_id.clone(),
        };
        match self.spawn_producer(guard) {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                debug!(source_id = %source_id, "producer thread started");
                Ok(())
            }
            Err(e) => {
                // The guard was dropped with the closure, the device is closed
                self.running.store(false, Ordering::Release);
                self.lifecycle.fail(format!("cannot spawn producer thread: {e}"));
                Err(ContractError::device_unavailable(&source_id, e.to_string()))
            }
        }
    }

    #[instrument(
        name = "polled_source_stop",
        skip(self),
        fields(source_id = %self.lifecycle.source_id())
    )]
    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.lifecycle.finish();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Called from inside an emission on the producer thread; the
                // loop observes `running` and exits on its own.
                return;
            }
            handle.thread().unpark();
            if handle.join().is_err() {
                error!(source_id = %self.lifecycle.source_id(), "producer thread panicked");
            }
        }
    }

    fn state(&self) -> SourceState {
        self.lifecycle.state()
    }
}

impl<D: SampleDevice> Drop for PolledSource<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_producer<D: SampleDevice>(
    mut guard: DeviceGuard<D>,
    lifecycle: &SourceLifecycle,
    running: &AtomicBool,
) {
    let source_id = lifecycle.source_id();
    let metrics = lifecycle.metrics();
    let interval = guard.device.poll_interval();

    let connected = lifecycle.emit(Sample::Connection {
        state: ConnectionState::Connected,
    });
    if !connected.is_open() {
        return;
    }

    while running.load(Ordering::Acquire) {
        let polled = panic::catch_unwind(AssertUnwindSafe(|| guard.device.poll()));
        let keep_going = match polled {
            Ok(Ok(DevicePoll::Sample(sample))) => lifecycle.emit(sample).is_open(),
            Ok(Ok(DevicePoll::Idle)) => {
                metrics.record_idle_poll();
                true
            }
            Ok(Ok(DevicePoll::Lost(message))) => {
                warn!(source_id = %source_id, %message, "device lost");
                lifecycle.fail(message);
                false
            }
            Ok(Err(e)) => {
                warn!(source_id = %source_id, error = %e, "device lost");
                lifecycle.fail(e.terminal_message());
                false
            }
            Err(_) => {
                error!(source_id = %source_id, "device driver panicked");
                lifecycle.fail("device driver panicked");
                false
            }
        };
        if !keep_going {
            break;
        }
        thread::park_timeout(interval);
    }

    debug!(source_id = %source_id, "producer loop finished");
}
