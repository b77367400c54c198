//! NMEA device
//!
//! Reads NMEA 0183 sentences from any [`BufRead`] and converts the
//! pressure-altitude and vario sentences of Soaribox/Zander and Garmin
//! instruments into samples:
//!
//! | Sentence                 | Sample                                   |
//! |--------------------------|------------------------------------------|
//! | `$PZAN1,alt`             | `PressureAltitude(alt)`                  |
//! | `$PZAN2,vtas,wnet`       | `Vario((wnet - 10000) / 100)`            |
//! | `$PGRMZ,alt,f` / `,m`    | `PressureAltitude` (feet converted)      |
//!
//! `$SOARIM` text messages are logged at info level. Wind (`PZAN3`),
//! MacCready (`PZAN4`) and flight mode (`PZAN5`) have no sample variant and
//! are dropped with a trace event. Every sentence must carry a valid `*hh`
//! checksum. Anything else is skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use contracts::{ContractError, Sample};
use tracing::{debug, info, trace};

use crate::device::{DevicePoll, SampleDevice};

const FEET_TO_METRES: f64 = 0.3048;

/// NMEA sentence device
pub struct NmeaDevice {
    reader: Option<Box<dyn BufRead + Send>>,
    path: Option<PathBuf>,
    interval: Duration,
    opened_at: Option<Instant>,
    line: String,
}

impl NmeaDevice {
    /// Device reading from an already open stream
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            path: None,
            interval: Duration::from_millis(10),
            opened_at: None,
            line: String::new(),
        }
    }

    /// Device reading a log file, opened on `open`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            reader: None,
            path: Some(path.into()),
            interval: Duration::from_millis(10),
            opened_at: None,
            line: String::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn timestamp(&self) -> f64 {
        self.opened_at
            .map(|opened| opened.elapsed().as_secs_f64())
            .unwrap_or_default()
    }
}

impl SampleDevice for NmeaDevice {
    fn open(&mut self) -> Result<(), ContractError> {
        if self.reader.is_none() {
            let Some(path) = &self.path else {
                return Err(ContractError::Other("no NMEA input configured".into()));
            };
            let file = File::open(path)?;
            debug!(path = %path.display(), "NMEA log opened");
            self.reader = Some(Box::new(BufReader::new(file)));
        }
        self.opened_at = Some(Instant::now());
        Ok(())
    }

    fn poll(&mut self) -> Result<DevicePoll, ContractError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(DevicePoll::Lost("device not open".into()));
        };

        self.line.clear();
        if reader.read_line(&mut self.line)? == 0 {
            return Ok(DevicePoll::Lost("end of stream".into()));
        }

        let timestamp = self.timestamp();
        Ok(match parse_sentence(self.line.trim(), timestamp) {
            Some(sample) => DevicePoll::Sample(sample),
            None => DevicePoll::Idle,
        })
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }
}

/// Verify the `*hh` checksum of a sentence and return its body
///
/// The checksum is the XOR of every byte between `$` and `*`.
pub fn verify_checksum(sentence: &str) -> Option<&str> {
    let body = sentence.strip_prefix('$')?;
    let (body, checksum) = body.rsplit_once('*')?;
    let expected = u8::from_str_radix(checksum.get(..2)?, 16).ok()?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    (actual == expected).then_some(body)
}

/// Convert one sentence into a sample, `None` if it carries nothing usable
pub fn parse_sentence(sentence: &str, timestamp: f64) -> Option<Sample> {
    let Some(body) = verify_checksum(sentence) else {
        trace!(sentence, "checksum mismatch");
        return None;
    };

    let mut fields = body.split(',');
    let sample = match fields.next()? {
        "PZAN1" => {
            let altitude_m = fields.next()?.parse().ok()?;
            Sample::PressureAltitude {
                timestamp,
                altitude_m,
            }
        }
        "PZAN2" => {
            let _true_airspeed = fields.next()?;
            let wnet: f64 = fields.next()?.parse().ok()?;
            Sample::Vario {
                timestamp,
                vario_mps: (wnet - 10000.0) / 100.0,
            }
        }
        "PGRMZ" => {
            let altitude: f64 = fields.next()?.parse().ok()?;
            let altitude_m = match fields.next()? {
                "f" | "F" => altitude * FEET_TO_METRES,
                "m" | "M" => altitude,
                _ => return None,
            };
            Sample::PressureAltitude {
                timestamp,
                altitude_m,
            }
        }
        "SOARIM" => {
            info!(message = %fields.collect::<Vec<_>>().join(","), "device message");
            return None;
        }
        kind @ ("PZAN3" | "PZAN4" | "PZAN5") => {
            trace!(sentence = kind, "no sample variant for sentence, dropped");
            return None;
        }
        other => {
            trace!(sentence = other, "sentence ignored");
            return None;
        }
    };
    Some(sample)
}
