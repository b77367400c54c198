//! Source lifecycle state machine
//!
//! Shared by every [`SensorSource`](contracts::SensorSource) implementation in
//! this crate. The lifecycle owns the emitter, the per-source sequence counter
//! and the [`SourceState`]; all three are guarded by one lock that is held
//! while an envelope is handed to the emitter. That makes a terminal state
//! change and the hand-off of its envelope a single step, and it means
//! `finish` waits for an in-flight emission before returning.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    ConnectionState, ContractError, EnvelopeEmitter, Sample, SampleEnvelope, SourceId,
    SourceState,
};
use tracing::{debug, trace, warn};

use crate::metrics::SourceMetrics;

/// Result of a single emission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Envelope handed to the emitter
    Delivered { sequence: u64, terminal: bool },
    /// Source not started, or its stream already ended
    Inactive,
    /// Sample failed validation or would violate the state machine
    Rejected,
}

impl EmitOutcome {
    /// Whether the producer should keep going
    pub fn is_open(&self) -> bool {
        match self {
            Self::Delivered { terminal, .. } => !terminal,
            Self::Inactive => false,
            Self::Rejected => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Running,
    Ended,
}

struct Inner {
    phase: Phase,
    state: SourceState,
    emitter: Option<EnvelopeEmitter>,
    next_sequence: u64,
}

/// Lifecycle of one source
pub struct SourceLifecycle {
    source_id: SourceId,
    inner: Mutex<Inner>,
    metrics: Arc<SourceMetrics>,
}

impl SourceLifecycle {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                state: SourceState::Disconnected,
                emitter: None,
                next_sequence: 1,
            }),
            metrics: Arc::new(SourceMetrics::new()),
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn state(&self) -> SourceState {
        self.lock().state
    }

    pub fn metrics(&self) -> Arc<SourceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Whether emissions are currently accepted
    pub fn is_running(&self) -> bool {
        self.lock().phase == Phase::Running
    }

    /// Reserve the single start of this source
    ///
    /// Must be followed by [`commit_start`](Self::commit_start) once the
    /// device is acquired, or [`abort_start`](Self::abort_start) if it is not.
    ///
    /// # Errors
    /// `AlreadyStarted` unless the source has never started.
    pub fn begin_start(&self, emitter: EnvelopeEmitter) -> Result<(), ContractError> {
        let mut inner = self.lock();
        if inner.phase != Phase::Idle {
            return Err(ContractError::already_started(&self.source_id));
        }
        inner.phase = Phase::Starting;
        inner.emitter = Some(emitter);
        Ok(())
    }

    /// Device acquired; accept emissions
    pub fn commit_start(&self) {
        let mut inner = self.lock();
        if inner.phase == Phase::Starting {
            inner.phase = Phase::Running;
            debug!(source_id = %self.source_id, "source running");
        }
    }

    /// Device acquisition failed; the source may be started again
    pub fn abort_start(&self) {
        let mut inner = self.lock();
        if inner.phase == Phase::Starting {
            inner.phase = Phase::Idle;
            inner.emitter = None;
        }
    }

    /// Validate, sequence and hand off one sample
    pub fn emit(&self, sample: Sample) -> EmitOutcome {
        let mut inner = self.lock();
        self.emit_locked(&mut inner, sample)
    }

    /// Fail the source with a terminal error envelope
    pub fn fail(&self, message: impl Into<String>) -> EmitOutcome {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "unknown source error".to_string()
        } else {
            message
        };
        self.emit(Sample::error(message))
    }

    /// End the stream from the consumer side
    ///
    /// Waits for an in-flight emission, then emits `Connection(Disconnected)`
    /// if the stream is still open. Idempotent.
    pub fn finish(&self) {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Running => {
                let outcome = self.emit_locked(
                    &mut inner,
                    Sample::Connection {
                        state: ConnectionState::Disconnected,
                    },
                );
                trace!(source_id = %self.source_id, ?outcome, "disconnect emitted");
            }
            Phase::Idle | Phase::Starting => {
                inner.phase = Phase::Ended;
                inner.emitter = None;
            }
            Phase::Ended => {}
        }
    }

    fn emit_locked(&self, inner: &mut Inner, sample: Sample) -> EmitOutcome {
        if inner.phase != Phase::Running {
            trace!(source_id = %self.source_id, kind = ?sample.kind(), "emit on inactive source");
            return EmitOutcome::Inactive;
        }

        let next_state = match next_state(inner.state, &sample) {
            Some(state) => state,
            None => {
                self.metrics.record_rejected();
                warn!(
                    source_id = %self.source_id,
                    state = ?inner.state,
                    kind = ?sample.kind(),
                    "sample rejected: invalid lifecycle transition"
                );
                return EmitOutcome::Rejected;
            }
        };

        let sequence = inner.next_sequence;
        let envelope = match SampleEnvelope::new(self.source_id.clone(), sequence, sample) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.record_rejected();
                warn!(source_id = %self.source_id, error = %e, "sample rejected");
                return EmitOutcome::Rejected;
            }
        };

        let terminal = envelope.is_terminal();
        let kind = envelope.kind();
        inner.next_sequence += 1;
        inner.state = next_state;
        if terminal {
            inner.phase = Phase::Ended;
        }

        if let Some(emitter) = inner.emitter.as_ref() {
            emitter(envelope);
        }
        self.metrics.record_emitted();
        observability::record_envelope_emitted(&self.source_id, kind.as_str());

        if terminal {
            inner.emitter = None;
            if next_state == SourceState::Failed {
                observability::record_source_failed(&self.source_id);
            }
            debug!(
                source_id = %self.source_id,
                state = ?next_state,
                sequence,
                "source stream ended"
            );
        }

        EmitOutcome::Delivered { sequence, terminal }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State after emitting `sample` from `state`, `None` if not allowed
fn next_state(state: SourceState, sample: &Sample) -> Option<SourceState> {
    match (state, sample) {
        (SourceState::Failed, _) => None,
        (_, Sample::Error { .. }) => Some(SourceState::Failed),
        (
            SourceState::Disconnected,
            Sample::Connection {
                state: ConnectionState::Connected,
            },
        ) => Some(SourceState::Connected),
        (
            _,
            Sample::Connection {
                state: ConnectionState::Disconnected,
            },
        ) => Some(SourceState::Disconnected),
        (SourceState::Connected, Sample::Connection { .. }) => None,
        (SourceState::Connected, _) => Some(SourceState::Connected),
        (SourceState::Disconnected, _) => None,
    }
}
