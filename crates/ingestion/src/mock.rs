//! Mock device
//!
//! Generates simulated readings for every [`MockKind`]. Used for testing and
//! development without sensor hardware.

use std::f64::consts::TAU;
use std::time::Duration;

use contracts::{
    AuxiliaryInput, BarometricReading, ContractError, LocationFix, MockKind, Sample, Vector3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::device::{DevicePoll, SampleDevice};

/// Epoch of the simulated GPS clock (ms)
const FIX_EPOCH_MS: i64 = 1_700_000_000_000;

/// Rate used when the configured one is zero, negative or not finite
const FALLBACK_FREQUENCY_HZ: f64 = 10.0;

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    /// Poll frequency (Hz)
    pub frequency_hz: f64,

    /// Report the device as lost after this many samples
    pub fail_after: Option<u64>,

    /// `false` makes `open` fail
    pub available: bool,

    /// Noise seed; random when absent
    pub seed: Option<u64>,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: FALLBACK_FREQUENCY_HZ,
            fail_after: None,
            available: true,
            seed: None,
        }
    }
}

/// Mock device
pub struct MockDevice {
    kind: MockKind,
    config: MockDeviceConfig,
    rng: StdRng,
    tick: u64,
}

impl MockDevice {
    pub fn new(kind: MockKind, mut config: MockDeviceConfig) -> Self {
        if !(config.frequency_hz.is_finite() && config.frequency_hz > 0.0) {
            warn!(
                kind = ?kind,
                frequency_hz = config.frequency_hz,
                fallback_hz = FALLBACK_FREQUENCY_HZ,
                "invalid mock frequency, using fallback"
            );
            config.frequency_hz = FALLBACK_FREQUENCY_HZ;
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            kind,
            config,
            rng,
            tick: 0,
        }
    }

    /// Mock device with default configuration at the given rate
    pub fn with_frequency(kind: MockKind, frequency_hz: f64) -> Self {
        Self::new(
            kind,
            MockDeviceConfig {
                frequency_hz,
                ..Default::default()
            },
        )
    }

    pub fn kind(&self) -> MockKind {
        self.kind
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.random_range(-amplitude..=amplitude)
    }

    /// Generate the reading for the current tick
    fn generate(&mut self) -> Sample {
        let t = self.tick as f64 / self.config.frequency_hz;
        match self.kind {
            MockKind::Location => {
                // Slow circle around a fixed point, one lap every 10 minutes
                let angle = TAU * t / 600.0;
                let fix = LocationFix::new(
                    FIX_EPOCH_MS + (t * 1000.0) as i64,
                    8,
                    11.0 + 0.01 * angle.cos(),
                    47.0 + 0.01 * angle.sin(),
                )
                .with_altitude(1200.0 + self.noise(2.0))
                .with_bearing(angle.to_degrees() + 90.0)
                .with_speed(15.0 + self.noise(0.5))
                .with_accuracy(5.0);
                Sample::Location { timestamp: t, fix }
            }
            MockKind::Accelerometer => Sample::Acceleration {
                timestamp: t,
                vector: Vector3::new(self.noise(0.1), self.noise(0.1), 9.81 + self.noise(0.1)),
            },
            MockKind::Gyroscope => Sample::Rotation {
                timestamp: t,
                vector: Vector3::new(self.noise(0.01), self.noise(0.01), self.noise(0.01)),
            },
            MockKind::Magnetometer => Sample::MagneticField {
                timestamp: t,
                vector: Vector3::new(
                    20.0 + self.noise(0.5),
                    self.noise(0.5),
                    -45.0 + self.noise(0.5),
                ),
            },
            MockKind::Barometer => Sample::BarometricPressure {
                timestamp: t,
                reading: BarometricReading {
                    pressure_hpa: 1013.25 + self.noise(0.05),
                    noise_variance: 0.0025,
                },
            },
            MockKind::PressureAltitude => Sample::PressureAltitude {
                timestamp: t,
                altitude_m: 1000.0 + 20.0 * (t / 30.0).sin() + self.noise(0.5),
            },
            MockKind::Vario => Sample::Vario {
                timestamp: t,
                vario_mps: 1.5 * (t / 10.0).sin() + self.noise(0.2),
            },
            MockKind::HeartRate => Sample::HeartRate {
                timestamp: t,
                bpm: self.rng.random_range(65..=80),
            },
            MockKind::Nunchuk => Sample::AuxiliaryInput {
                timestamp: t,
                input: AuxiliaryInput {
                    joy_x: self.rng.random_range(-100..=100),
                    joy_y: self.rng.random_range(-100..=100),
                    accel_x: self.rng.random_range(-512..=512),
                    accel_y: self.rng.random_range(-512..=512),
                    accel_z: self.rng.random_range(-512..=512),
                    switches: self.rng.random_range(0..4),
                },
            },
        }
    }
}

impl SampleDevice for MockDevice {
    fn open(&mut self) -> Result<(), ContractError> {
        if !self.config.available {
            return Err(ContractError::Other(format!(
                "mock {:?} device not present",
                self.kind
            )));
        }
        debug!(kind = ?self.kind, frequency_hz = self.config.frequency_hz, "mock device opened");
        Ok(())
    }

    fn poll(&mut self) -> Result<DevicePoll, ContractError> {
        if let Some(limit) = self.config.fail_after {
            if self.tick >= limit {
                return Ok(DevicePoll::Lost("device lost".to_string()));
            }
        }

        let sample = self.generate();
        self.tick += 1;
        trace!(kind = ?self.kind, tick = self.tick, "mock sample");
        Ok(DevicePoll::Sample(sample))
    }

    fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.config.frequency_hz)
            .unwrap_or(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(kind: MockKind) -> MockDevice {
        MockDevice::new(
            kind,
            MockDeviceConfig {
                seed: Some(7),
                ..Default::default()
            },
        )
    }

    fn next_sample(device: &mut MockDevice) -> Sample {
        match device.poll().unwrap() {
            DevicePoll::Sample(sample) => sample,
            other => panic!("expected a sample, got {other:?}"),
        }
    }

    #[test]
    fn test_every_kind_produces_valid_samples() {
        let kinds = [
            MockKind::Location,
            MockKind::Accelerometer,
            MockKind::Gyroscope,
            MockKind::Magnetometer,
            MockKind::Barometer,
            MockKind::PressureAltitude,
            MockKind::Vario,
            MockKind::HeartRate,
            MockKind::Nunchuk,
        ];
        for kind in kinds {
            let mut device = seeded(kind);
            device.open().unwrap();
            for _ in 0..20 {
                let sample = next_sample(&mut device);
                assert!(sample.clone().validate().is_ok(), "{kind:?}: {sample:?}");
            }
        }
    }

    #[test]
    fn test_timestamps_follow_frequency() {
        let mut device = seeded(MockKind::Vario);
        let first = next_sample(&mut device).timestamp().unwrap();
        let second = next_sample(&mut device).timestamp().unwrap();
        assert_eq!(first, 0.0);
        assert!((second - 0.1).abs() < 1e-9);
        assert_eq!(device.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_frequency_falls_back() {
        for frequency_hz in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let mut device = MockDevice::with_frequency(MockKind::Vario, frequency_hz);
            device.open().unwrap();
            next_sample(&mut device);
            let second = next_sample(&mut device);
            assert!(second.clone().validate().is_ok(), "{frequency_hz}: {second:?}");
            assert!((second.timestamp().unwrap() - 0.1).abs() < 1e-9);
            assert_eq!(device.poll_interval(), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_location_has_altitude() {
        let mut device = seeded(MockKind::Location);
        match next_sample(&mut device) {
            Sample::Location { fix, .. } => {
                assert!(fix.altitude.is_some());
                assert!(fix.bearing.is_some());
                assert!(fix.acceleration.is_none());
                assert_eq!(fix.satellites, 8);
            }
            other => panic!("unexpected sample {other:?}"),
        }
    }

    #[test]
    fn test_same_seed_same_readings() {
        let mut a = seeded(MockKind::Accelerometer);
        let mut b = seeded(MockKind::Accelerometer);
        for _ in 0..5 {
            assert_eq!(next_sample(&mut a), next_sample(&mut b));
        }
    }

    #[test]
    fn test_fail_after() {
        let mut device = MockDevice::new(
            MockKind::HeartRate,
            MockDeviceConfig {
                fail_after: Some(2),
                seed: Some(1),
                ..Default::default()
            },
        );
        next_sample(&mut device);
        next_sample(&mut device);
        assert_eq!(
            device.poll().unwrap(),
            DevicePoll::Lost("device lost".to_string())
        );
    }

    #[test]
    fn test_unavailable_device() {
        let mut device = MockDevice::new(
            MockKind::Barometer,
            MockDeviceConfig {
                available: false,
                ..Default::default()
            },
        );
        assert!(device.open().is_err());
    }
}
