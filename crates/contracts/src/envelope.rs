//! SampleEnvelope - one sensor reading or state transition
//!
//! Envelopes are validated once at construction and immutable afterwards, so
//! they are shared between listener queues as `Arc<SampleEnvelope>` without
//! locking.

use serde::{Deserialize, Serialize};

use crate::{ContractError, SourceId};

/// Stable discriminant for each sample variant.
///
/// The numeric values are part of the transport contract and must not be
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SampleKind {
    Connection = 0,
    Location = 1,
    Acceleration = 2,
    Rotation = 3,
    MagneticField = 4,
    BarometricPressure = 5,
    PressureAltitude = 6,
    Vario = 7,
    HeartRate = 8,
    AuxiliaryInput = 9,
    Error = 10,
}

impl SampleKind {
    /// Wire tag
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Metric / log label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Location => "location",
            Self::Acceleration => "acceleration",
            Self::Rotation => "rotation",
            Self::MagneticField => "magnetic_field",
            Self::BarometricPressure => "barometric_pressure",
            Self::PressureAltitude => "pressure_altitude",
            Self::Vario => "vario",
            Self::HeartRate => "heart_rate",
            Self::AuxiliaryInput => "auxiliary_input",
            Self::Error => "error",
        }
    }
}

/// Connection state reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// 3D vector, axis meaning depends on the carrying variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Satellite position fix
///
/// Receivers do not always supply every field, so the optional ones are
/// `Option`s. `satellites` is always reported by the hardware and has no
/// presence flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Fix time reported by the receiver (ms since the Unix epoch)
    pub fix_time_ms: i64,

    /// Satellites used in the fix
    pub satellites: u32,

    /// Degrees, [-180, 180]
    pub longitude: f64,

    /// Degrees, [-90, 90]
    pub latitude: f64,

    /// Meters above MSL
    pub altitude: Option<f64>,

    /// Degrees true, normalized into [0, 360)
    pub bearing: Option<f64>,

    /// Ground speed (m/s)
    pub speed: Option<f64>,

    /// Horizontal accuracy (m)
    pub accuracy: Option<f64>,

    /// Along-track acceleration (m/s²)
    pub acceleration: Option<f64>,
}

impl LocationFix {
    /// Create a fix with only the mandatory fields present
    pub fn new(fix_time_ms: i64, satellites: u32, longitude: f64, latitude: f64) -> Self {
        Self {
            fix_time_ms,
            satellites,
            longitude,
            latitude,
            altitude: None,
            bearing: None,
            speed: None,
            accuracy: None,
            acceleration: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_acceleration(mut self, acceleration: f64) -> Self {
        self.acceleration = Some(acceleration);
        self
    }
}

/// Static pressure reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarometricReading {
    /// Static pressure (hPa)
    pub pressure_hpa: f64,

    /// Sensor noise variance as reported by the platform
    pub noise_variance: f64,
}

/// Raw state of an auxiliary controller (e.g. a Wii nunchuk)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryInput {
    pub joy_x: i32,
    pub joy_y: i32,
    pub accel_x: i32,
    pub accel_y: i32,
    pub accel_z: i32,
    /// Button bit mask
    pub switches: u32,
}

/// Sensor sample payload
///
/// `timestamp` is monotonic seconds. Connection and error events are state
/// transitions and carry no timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sample {
    Connection { state: ConnectionState },
    Location { timestamp: f64, fix: LocationFix },
    /// m/s²
    Acceleration { timestamp: f64, vector: Vector3 },
    /// rad/s
    Rotation { timestamp: f64, vector: Vector3 },
    /// µT
    MagneticField { timestamp: f64, vector: Vector3 },
    BarometricPressure {
        timestamp: f64,
        reading: BarometricReading,
    },
    PressureAltitude { timestamp: f64, altitude_m: f64 },
    Vario { timestamp: f64, vario_mps: f64 },
    HeartRate { timestamp: f64, bpm: u32 },
    AuxiliaryInput {
        timestamp: f64,
        input: AuxiliaryInput,
    },
    /// The source is defunct; terminal
    Error { message: String },
}

impl Sample {
    /// Shorthand for an error sample
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            Self::Connection { .. } => SampleKind::Connection,
            Self::Location { .. } => SampleKind::Location,
            Self::Acceleration { .. } => SampleKind::Acceleration,
            Self::Rotation { .. } => SampleKind::Rotation,
            Self::MagneticField { .. } => SampleKind::MagneticField,
            Self::BarometricPressure { .. } => SampleKind::BarometricPressure,
            Self::PressureAltitude { .. } => SampleKind::PressureAltitude,
            Self::Vario { .. } => SampleKind::Vario,
            Self::HeartRate { .. } => SampleKind::HeartRate,
            Self::AuxiliaryInput { .. } => SampleKind::AuxiliaryInput,
            Self::Error { .. } => SampleKind::Error,
        }
    }

    /// Measurement timestamp, `None` for state transitions
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Self::Connection { .. } | Self::Error { .. } => None,
            Self::Location { timestamp, .. }
            | Self::Acceleration { timestamp, .. }
            | Self::Rotation { timestamp, .. }
            | Self::MagneticField { timestamp, .. }
            | Self::BarometricPressure { timestamp, .. }
            | Self::PressureAltitude { timestamp, .. }
            | Self::Vario { timestamp, .. }
            | Self::HeartRate { timestamp, .. }
            | Self::AuxiliaryInput { timestamp, .. } => Some(*timestamp),
        }
    }

    /// Whether this sample ends the emitting source's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Error { .. }
                | Self::Connection {
                    state: ConnectionState::Disconnected
                }
        )
    }

    /// Check construction constraints and normalize angles
    pub fn validate(self) -> Result<Self, ContractError> {
        let kind = self.kind();
        if let Some(timestamp) = self.timestamp() {
            let timestamp = finite(kind, "timestamp", timestamp)?;
            if timestamp < 0.0 {
                return Err(ContractError::invalid_sample(
                    kind,
                    format!("timestamp must be >= 0, got {timestamp}"),
                ));
            }
        }

        match self {
            Self::Location { timestamp, fix } => Ok(Self::Location {
                timestamp,
                fix: validate_fix(fix)?,
            }),
            Self::Acceleration { vector, .. }
            | Self::Rotation { vector, .. }
            | Self::MagneticField { vector, .. } => {
                finite(kind, "x", vector.x)?;
                finite(kind, "y", vector.y)?;
                finite(kind, "z", vector.z)?;
                Ok(self)
            }
            Self::BarometricPressure { reading, .. } => {
                non_negative(kind, "pressure_hpa", reading.pressure_hpa)?;
                non_negative(kind, "noise_variance", reading.noise_variance)?;
                Ok(self)
            }
            Self::PressureAltitude { altitude_m, .. } => {
                finite(kind, "altitude_m", altitude_m)?;
                Ok(self)
            }
            Self::Vario { vario_mps, .. } => {
                finite(kind, "vario_mps", vario_mps)?;
                Ok(self)
            }
            Self::Error { ref message } if message.trim().is_empty() => Err(
                ContractError::invalid_sample(kind, "error message cannot be empty"),
            ),
            Self::Connection { .. }
            | Self::HeartRate { .. }
            | Self::AuxiliaryInput { .. }
            | Self::Error { .. } => Ok(self),
        }
    }
}

fn finite(kind: SampleKind, field: &str, value: f64) -> Result<f64, ContractError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ContractError::invalid_sample(
            kind,
            format!("{field} must be finite, got {value}"),
        ))
    }
}

fn non_negative(kind: SampleKind, field: &str, value: f64) -> Result<f64, ContractError> {
    let value = finite(kind, field, value)?;
    if value < 0.0 {
        return Err(ContractError::invalid_sample(
            kind,
            format!("{field} must be >= 0, got {value}"),
        ));
    }
    Ok(value)
}

fn in_range(
    kind: SampleKind,
    field: &str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ContractError> {
    let value = finite(kind, field, value)?;
    if value < min || value > max {
        return Err(ContractError::invalid_sample(
            kind,
            format!("{field} must be within [{min}, {max}], got {value}"),
        ));
    }
    Ok(value)
}

/// Fold a bearing into [0, 360)
fn normalize_bearing(bearing: f64) -> f64 {
    let folded = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

fn validate_fix(fix: LocationFix) -> Result<LocationFix, ContractError> {
    let kind = SampleKind::Location;
    in_range(kind, "longitude", fix.longitude, -180.0, 180.0)?;
    in_range(kind, "latitude", fix.latitude, -90.0, 90.0)?;

    let altitude = fix
        .altitude
        .map(|v| finite(kind, "altitude", v))
        .transpose()?;
    let bearing = fix
        .bearing
        .map(|v| finite(kind, "bearing", v).map(normalize_bearing))
        .transpose()?;
    let speed = fix
        .speed
        .map(|v| non_negative(kind, "speed", v))
        .transpose()?;
    let accuracy = fix
        .accuracy
        .map(|v| non_negative(kind, "accuracy", v))
        .transpose()?;
    let acceleration = fix
        .acceleration
        .map(|v| finite(kind, "acceleration", v))
        .transpose()?;

    Ok(LocationFix {
        altitude,
        bearing,
        speed,
        accuracy,
        acceleration,
        ..fix
    })
}

/// One validated sample stamped with its origin
///
/// Fields are private: the only way to build an envelope is
/// [`SampleEnvelope::new`], which enforces the sample constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEnvelope {
    source_id: SourceId,
    sequence: u64,
    sample: Sample,
}

impl SampleEnvelope {
    /// Validate `sample` and wrap it
    ///
    /// # Errors
    /// `InvalidSample` if a numeric field is not finite or out of range, or an
    /// error message is empty.
    pub fn new(source_id: SourceId, sequence: u64, sample: Sample) -> Result<Self, ContractError> {
        Ok(Self {
            source_id,
            sequence,
            sample: sample.validate()?,
        })
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Per-source emission sequence (starts at 1)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn kind(&self) -> SampleKind {
        self.sample.kind()
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.sample.timestamp()
    }

    pub fn is_terminal(&self) -> bool {
        self.sample.is_terminal()
    }

    pub fn into_sample(self) -> Sample {
        self.sample
    }
}
