//! SensorListener trait - consumer side of the event bus
//!
//! One handler per sample variant, all defaulting to no-ops, so a listener
//! only implements what it cares about.

use crate::{
    AuxiliaryInput, BarometricReading, ConnectionState, ContractError, LocationFix, Sample,
    SampleEnvelope, SourceId, Vector3,
};

/// Result returned by every listener handler
pub type ListenerResult = Result<(), ContractError>;

/// Envelope consumer
///
/// The bus never calls one listener concurrently with itself, so handlers take
/// `&mut self` and implementations need no internal synchronization. Returning
/// an error (or panicking) is reported as a listener fault; delivery to other
/// listeners and of later envelopes continues.
#[allow(unused_variables)]
pub trait SensorListener {
    /// Listener name (used for logging/metrics)
    fn name(&self) -> &str;

    fn on_connected(&mut self, source: &SourceId, state: ConnectionState) -> ListenerResult {
        Ok(())
    }

    fn on_location(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        fix: &LocationFix,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_acceleration(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        accel: Vector3,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_rotation(&mut self, source: &SourceId, timestamp: f64, rate: Vector3) -> ListenerResult {
        Ok(())
    }

    fn on_magnetic_field(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        field: Vector3,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_barometric_pressure(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        reading: BarometricReading,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_pressure_altitude(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        altitude_m: f64,
    ) -> ListenerResult {
        Ok(())
    }

    fn on_vario(&mut self, source: &SourceId, timestamp: f64, vario_mps: f64) -> ListenerResult {
        Ok(())
    }

    fn on_heart_rate(&mut self, source: &SourceId, timestamp: f64, bpm: u32) -> ListenerResult {
        Ok(())
    }

    fn on_auxiliary_input(
        &mut self,
        source: &SourceId,
        timestamp: f64,
        input: &AuxiliaryInput,
    ) -> ListenerResult {
        Ok(())
    }

    /// The source is defunct
    fn on_error(&mut self, source: &SourceId, message: &str) -> ListenerResult {
        Ok(())
    }

    /// Route an envelope to the matching handler
    ///
    /// Override to receive every envelope in one place (recorders, loggers).
    fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
        let source = envelope.source_id();
        match envelope.sample() {
            Sample::Connection { state } => self.on_connected(source, *state),
            Sample::Location { timestamp, fix } => self.on_location(source, *timestamp, fix),
            Sample::Acceleration { timestamp, vector } => {
                self.on_acceleration(source, *timestamp, *vector)
            }
            Sample::Rotation { timestamp, vector } => self.on_rotation(source, *timestamp, *vector),
            Sample::MagneticField { timestamp, vector } => {
                self.on_magnetic_field(source, *timestamp, *vector)
            }
            Sample::BarometricPressure { timestamp, reading } => {
                self.on_barometric_pressure(source, *timestamp, *reading)
            }
            Sample::PressureAltitude {
                timestamp,
                altitude_m,
            } => self.on_pressure_altitude(source, *timestamp, *altitude_m),
            Sample::Vario {
                timestamp,
                vario_mps,
            } => self.on_vario(source, *timestamp, *vario_mps),
            Sample::HeartRate { timestamp, bpm } => self.on_heart_rate(source, *timestamp, *bpm),
            Sample::AuxiliaryInput { timestamp, input } => {
                self.on_auxiliary_input(source, *timestamp, input)
            }
            Sample::Error { message } => self.on_error(source, message),
        }
    }
}
