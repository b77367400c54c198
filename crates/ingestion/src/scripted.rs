//! Scripted device
//!
//! Replays a fixed list of samples, from memory or from a JSON-lines file
//! (one serialised [`Sample`] per line), then idles or reports a loss.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use contracts::{ContractError, Sample};
use tracing::debug;

use crate::device::{DevicePoll, SampleDevice};

/// What the device does once the script is exhausted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScriptEnd {
    /// Keep polling with nothing to report
    #[default]
    Idle,
    /// Report the device as lost with this message
    Lost(String),
}

/// Scripted device
#[derive(Debug)]
pub struct ScriptedDevice {
    pending: VecDeque<Sample>,
    path: Option<PathBuf>,
    end: ScriptEnd,
    interval: Duration,
}

impl ScriptedDevice {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            pending: samples.into_iter().collect(),
            path: None,
            end: ScriptEnd::Idle,
            interval: Duration::from_millis(10),
        }
    }

    /// Script read from a JSON-lines file when the device is opened
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new([])
        }
    }

    pub fn ending_with(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Samples not yet replayed
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// Parse a JSON-lines script; blank lines and `#` comments are skipped
pub fn parse_script(content: &str) -> Result<Vec<Sample>, ContractError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<Sample>(line).map_err(|e| {
                ContractError::Other(format!("script line {}: {e}", index + 1))
            })
        })
        .collect()
}

impl SampleDevice for ScriptedDevice {
    fn open(&mut self) -> Result<(), ContractError> {
        if let Some(path) = &self.path {
            let content = fs::read_to_string(path)?;
            let samples = parse_script(&content)?;
            debug!(path = %path.display(), samples = samples.len(), "script loaded");
            self.pending.extend(samples);
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<DevicePoll, ContractError> {
        if let Some(sample) = self.pending.pop_front() {
            return Ok(DevicePoll::Sample(sample));
        }
        Ok(match &self.end {
            ScriptEnd::Idle => DevicePoll::Idle,
            ScriptEnd::Lost(message) => DevicePoll::Lost(message.clone()),
        })
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_replay_then_lost() {
        let mut device = ScriptedDevice::new([
            Sample::Vario {
                timestamp: 1.0,
                vario_mps: 0.4,
            },
            Sample::HeartRate {
                timestamp: 1.5,
                bpm: 72,
            },
        ])
        .ending_with(ScriptEnd::Lost("device lost".into()));

        device.open().unwrap();
        assert!(matches!(device.poll().unwrap(), DevicePoll::Sample(Sample::Vario { .. })));
        assert!(matches!(
            device.poll().unwrap(),
            DevicePoll::Sample(Sample::HeartRate { bpm: 72, .. })
        ));
        assert_eq!(device.poll().unwrap(), DevicePoll::Lost("device lost".into()));
        assert_eq!(device.remaining(), 0);
    }

    #[test]
    fn test_idle_after_script() {
        let mut device = ScriptedDevice::new([]);
        device.open().unwrap();
        assert_eq!(device.poll().unwrap(), DevicePoll::Idle);
        assert_eq!(device.poll().unwrap(), DevicePoll::Idle);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# flight recording").unwrap();
        writeln!(file, r#"{{"kind":"pressure_altitude","timestamp":0.5,"altitude_m":812.0}}"#)
            .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"kind":"error","message":"cable unplugged"}}"#).unwrap();

        let mut device = ScriptedDevice::from_path(file.path());
        assert_eq!(device.remaining(), 0);
        device.open().unwrap();
        assert_eq!(device.remaining(), 2);
        assert_eq!(
            device.poll().unwrap(),
            DevicePoll::Sample(Sample::PressureAltitude {
                timestamp: 0.5,
                altitude_m: 812.0
            })
        );
        assert_eq!(
            device.poll().unwrap(),
            DevicePoll::Sample(Sample::error("cable unplugged"))
        );
    }

    #[test]
    fn test_bad_script_line() {
        let err = parse_script("{\"kind\":\"vario\"}\n").unwrap_err();
        assert!(err.to_string().contains("script line 1"));
    }

    #[test]
    fn test_missing_file_fails_open() {
        let mut device = ScriptedDevice::from_path("/nonexistent/script.jsonl");
        assert!(matches!(device.open(), Err(ContractError::Io(_))));
    }
}
