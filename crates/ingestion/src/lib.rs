//! # Ingestion
//!
//! Sensor sources for the event bus.
//!
//! Responsibilities:
//! - Own the source lifecycle (state, sequence numbers, terminal envelope)
//! - Drive devices on dedicated producer threads
//! - Provide mock, scripted and NMEA devices
//! - Build sources from `SourceConfig`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MockDevice, PolledSource};
//! use contracts::{MockKind, SensorSource};
//!
//! let device = MockDevice::with_frequency(MockKind::Vario, 10.0);
//! let source = Arc::new(PolledSource::new("vario", device));
//! bus.attach(source.clone())?;
//! // ...
//! source.stop();
//! ```

mod device;
mod factory;
mod lifecycle;
mod metrics;
mod mock;
mod nmea;
mod polled;
mod scripted;

pub use device::{DevicePoll, SampleDevice};
pub use factory::build_source;
pub use lifecycle::{EmitOutcome, SourceLifecycle};
pub use metrics::{SourceMetrics, SourceMetricsSnapshot};
pub use mock::{MockDevice, MockDeviceConfig};
pub use nmea::{parse_sentence, verify_checksum, NmeaDevice};
pub use polled::PolledSource;
pub use scripted::{parse_script, ScriptEnd, ScriptedDevice};
