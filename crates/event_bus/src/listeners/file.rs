//! FileListener - records envelopes as JSON lines
//!
//! One file per listener. Each line is the serialised envelope plus the wall
//! clock time it was recorded at. The writer is flushed after every error
//! envelope and when the listener is dropped.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use contracts::{ContractError, ListenerResult, SampleEnvelope, SensorListener};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Serialize)]
struct Record<'a> {
    recorded_at: String,
    #[serde(flatten)]
    envelope: &'a SampleEnvelope,
}

/// Listener that writes envelopes to a JSON-lines file
pub struct FileListener {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl FileListener {
    /// Create the file (and its parent directories), truncating it
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Create from params map (`path`, default `./recordings/<name>.jsonl`)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./recordings").join(format!("{name}.jsonl")));
        Self::new(name, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Envelopes recorded so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> ListenerResult {
        self.writer
            .flush()
            .map_err(|e| ContractError::listener_fault(&self.name, e.to_string()))
    }
}

impl SensorListener for FileListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
        let record = Record {
            recorded_at: Utc::now().to_rfc3339(),
            envelope,
        };
        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|e| ContractError::listener_fault(&self.name, e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;

        if envelope.is_terminal() {
            self.flush()?;
            debug!(listener = %self.name, source_id = %envelope.source_id(), "Recording flushed");
        }
        Ok(())
    }
}

impl Drop for FileListener {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!(listener = %self.name, error = %e, "Flush failed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConnectionState, Sample};
    use tempfile::tempdir;

    fn envelope(sequence: u64, sample: Sample) -> SampleEnvelope {
        SampleEnvelope::new("baro".into(), sequence, sample).unwrap()
    }

    #[test]
    fn test_records_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("baro.jsonl");

        {
            let mut listener = FileListener::new("recorder", &path).unwrap();
            listener
                .on_envelope(&envelope(
                    1,
                    Sample::Connection {
                        state: ConnectionState::Connected,
                    },
                ))
                .unwrap();
            listener
                .on_envelope(&envelope(
                    2,
                    Sample::PressureAltitude {
                        timestamp: 0.5,
                        altitude_m: 640.0,
                    },
                ))
                .unwrap();
            assert_eq!(listener.written(), 2);
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["source_id"], "baro");
        assert_eq!(lines[1]["sequence"], 2);
        assert_eq!(lines[1]["sample"]["kind"], "pressure_altitude");
        assert!(lines[0]["recorded_at"].is_string());
    }

    #[test]
    fn test_error_envelope_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gps.jsonl");
        let mut listener = FileListener::new("recorder", &path).unwrap();

        listener
            .on_envelope(&envelope(1, Sample::error("device lost")))
            .unwrap();

        // Still open, but the error line is already on disk
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("device lost"));
    }

    #[test]
    fn test_from_params() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let params = HashMap::from([("path".to_string(), path.display().to_string())]);
        let listener = FileListener::from_params("recorder", &params).unwrap();
        assert_eq!(listener.path(), path.as_path());
    }
}
