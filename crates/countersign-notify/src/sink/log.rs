// crates/countersign-notify/src/sink/log.rs
// ============================================================================
// Module: Log Event Sink
// Description: Line-oriented EventSink writing one JSON record per event.
// Purpose: Leave a durable, greppable trace of terminal envelope transitions.
// Dependencies: countersign-core, serde_json
// ============================================================================

//! ## Overview
//! [`LogSink`] serializes each published event as one JSON line on an
//! `io::Write` destination (a file, a pipe, a test buffer). Writes are
//! flushed per event so a crash loses at most the line being written. Any
//! serialization or I/O failure surfaces as
//! [`countersign_core::EventError::PublishFailed`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use countersign_core::EnvelopeEvent;
use countersign_core::EventError;
use countersign_core::EventSink;

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Event sink writing newline-delimited JSON records.
///
/// # Invariants
/// - One event produces exactly one line; lines are written whole under the
///   internal lock.
#[derive(Debug)]
pub struct LogSink<W: Write + Send> {
    /// Destination writer guarded for concurrent publishers.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a sink writing events to the given destination.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> EventSink for LogSink<W> {
    fn publish(&self, event: &EnvelopeEvent) -> Result<(), EventError> {
        let line = serde_json::to_string(event)
            .map_err(|err| EventError::PublishFailed(err.to_string()))?;
        let mut guard = self
            .writer
            .lock()
            .map_err(|_poisoned| EventError::PublishFailed("event log mutex poisoned".to_string()))?;
        writeln!(guard, "{line}").map_err(|err| EventError::PublishFailed(err.to_string()))?;
        guard.flush().map_err(|err| EventError::PublishFailed(err.to_string()))
    }
}
