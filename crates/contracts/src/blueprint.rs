//! BusBlueprint - Config Loader output
//!
//! Describes a complete deployment: bus tuning, sensor sources and listeners.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default per-listener queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default diagnostic channel capacity
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 256;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete bus deployment blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Bus tuning
    #[serde(default)]
    pub bus: BusConfig,

    /// Sensor sources to attach
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Listeners to subscribe
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

/// Event bus tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Per-listener queue depth
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// What a producer does when a listener queue is full
    #[serde(default)]
    pub backpressure: BackpressurePolicy,

    /// Capacity of the diagnostic broadcast channel
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            backpressure: BackpressurePolicy::default(),
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_diagnostics_capacity() -> usize {
    DEFAULT_DIAGNOSTICS_CAPACITY
}

/// Back-pressure policy for a full listener queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Block the producing source until the listener catches up
    #[default]
    Block,
    /// Evict the oldest queued envelope for that listener
    DropOldest,
}

/// Sensor source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source id
    pub id: String,

    /// Source implementation
    pub source_type: SourceType,

    /// Simulated sensor kind (mock sources only)
    #[serde(default)]
    pub kind: Option<MockKind>,

    /// Poll / emission rate
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// Type-specific parameters (e.g. `path`, `fail_after`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_frequency_hz() -> f64 {
    10.0
}

/// Source implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Simulated readings
    Mock,
    /// Replay of a JSON-lines sample script
    Scripted,
    /// NMEA sentence log
    Nmea,
}

/// Simulated sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockKind {
    Location,
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Barometer,
    PressureAltitude,
    Vario,
    HeartRate,
    Nunchuk,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Listener name
    pub name: String,

    /// Listener type
    pub listener_type: ListenerType,

    /// Queue depth override
    #[serde(default)]
    pub queue_depth: Option<usize>,

    /// Back-pressure override
    #[serde(default)]
    pub backpressure: Option<BackpressurePolicy>,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Built-in listener type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerType {
    /// Structured log line per envelope
    Log,
    /// JSON-lines recording
    File,
}

impl BusBlueprint {
    /// Ids of all configured sources
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.id.as_str())
    }

    /// Find a source by id
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.id == id)
    }
}
