//! # Event Bus
//!
//! Fan-out of sensor envelopes from sources to listeners.
//!
//! Responsibilities:
//! - Attach `SensorSource`s and forward their envelopes
//! - Deliver to every subscribed `SensorListener` through its own bounded queue
//! - Isolate faulty and slow listeners from producers and from each other
//! - Report isolated faults on a diagnostic channel

pub mod bus;
pub mod diagnostics;
pub mod error;
pub mod listeners;
pub mod metrics;
mod registry;
mod worker;

pub use bus::{AttachmentId, EventBus, EventBusBuilder};
pub use contracts::{BackpressurePolicy, BusConfig, SampleEnvelope, SensorListener, SensorSource};
pub use diagnostics::Diagnostic;
pub use error::BusError;
pub use listeners::{build_listener, FileListener, LogListener, SharedListener};
pub use metrics::{ListenerMetrics, ListenerMetricsReport, MetricsSnapshot};
pub use registry::{Subscription, SubscriptionOptions};
