//! SensorSource trait - Sensor data source abstraction
//!
//! Defines a unified interface for sensor sources, decoupling the event bus
//! from concrete device drivers. Simulated, scripted and NMEA-fed sources all
//! implement this trait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, SampleEnvelope, SourceId};

/// Envelope hand-off callback
///
/// The bus passes one of these to [`SensorSource::start`]; the source calls it
/// for every envelope it produces, on its own producer thread. The call may
/// block when the bus applies back-pressure.
pub type EnvelopeEmitter = Arc<dyn Fn(SampleEnvelope) + Send + Sync>;

/// Source lifecycle state
///
/// Transitions are one-directional:
/// `Disconnected -> Connected -> {Failed | Disconnected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    #[default]
    Disconnected,
    Connected,
    Failed,
}

/// Sensor data source trait
///
/// # Contract
///
/// 1. **Single start**: `start` may succeed at most once; the emitted sequence
///    is not restartable.
/// 2. **Terminal events**: after an `Error` or `Connection(Disconnected)`
///    envelope, nothing further is emitted.
/// 3. **Scoped release**: `stop` releases the underlying device on every path
///    and returns only once that is guaranteed.
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn SensorSource> = make_source();
/// source.start(Arc::new(|envelope| {
///     println!("{} #{}", envelope.source_id(), envelope.sequence());
/// }))?;
/// // ... use source ...
/// source.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Get source ID
    fn source_id(&self) -> &SourceId;

    /// Begin producing envelopes through `emitter`
    ///
    /// # Errors
    /// - `AlreadyStarted` if called a second time
    /// - `DeviceUnavailable` if the device cannot be acquired
    fn start(&self, emitter: EnvelopeEmitter) -> Result<(), ContractError>;

    /// Stop producing and release the device. Idempotent.
    fn stop(&self);

    /// Current lifecycle state
    fn state(&self) -> SourceState;
}
