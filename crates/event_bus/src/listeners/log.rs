//! LogListener - one structured tracing line per envelope

use contracts::{ListenerResult, Sample, SampleEnvelope, SensorListener};
use tracing::{info, warn};

/// Listener that logs every envelope for debugging
pub struct LogListener {
    name: String,
    count: u64,
}

impl LogListener {
    /// Create a new LogListener with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }

    /// Envelopes logged so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl SensorListener for LogListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
        self.count += 1;
        match envelope.sample() {
            Sample::Error { message } => warn!(
                listener = %self.name,
                source_id = %envelope.source_id(),
                sequence = envelope.sequence(),
                error = %message,
                "Source error received"
            ),
            sample => info!(
                listener = %self.name,
                source_id = %envelope.source_id(),
                sequence = envelope.sequence(),
                kind = envelope.kind().as_str(),
                timestamp = ?envelope.timestamp(),
                sample = ?sample,
                "Envelope received"
            ),
        }
        Ok(())
    }
}
