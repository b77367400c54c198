//! Diagnostic channel
//!
//! Faults the bus isolates are reported here rather than to the producer.
//! The channel is a `tokio::sync::broadcast`: a slow observer lags and loses
//! the oldest diagnostics, it never slows dispatch down.

use contracts::SourceId;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Isolated fault reported by the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A listener returned an error or panicked
    ListenerFault {
        listener: String,
        source_id: SourceId,
        sequence: u64,
        message: String,
        panicked: bool,
    },
    /// A source ended its stream with an error
    SourceError { source_id: SourceId, message: String },
    /// An envelope was evicted from a full DropOldest queue
    EnvelopeDropped {
        listener: String,
        source_id: SourceId,
        sequence: u64,
    },
    /// A listener was dropped by its owner without unsubscribing
    ListenerGone { listener: String },
}

/// Sending half of the diagnostic channel
#[derive(Debug, Clone)]
pub(crate) struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, diagnostic: Diagnostic) {
        // Err only means nobody is listening
        if self.tx.send(diagnostic).is_err() {
            trace!("diagnostic published without receivers");
        }
    }
}
