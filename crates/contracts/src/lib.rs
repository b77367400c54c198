//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the sensor bus:
//! envelopes, the source and listener traits, configuration and errors.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Measurement samples carry a monotonic timestamp (seconds, f64)
//! - Connection and error events are state transitions and carry none
//! - Delivery order across sources is not meaningful; consumers order by timestamp

mod blueprint;
mod envelope;
mod error;
mod listener;
mod sensor_source;
mod source_id;

pub use blueprint::*;
pub use envelope::*;
pub use error::*;
pub use listener::{ListenerResult, SensorListener};
pub use sensor_source::{EnvelopeEmitter, SensorSource, SourceState};
pub use source_id::SourceId;
