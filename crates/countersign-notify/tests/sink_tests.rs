// crates/countersign-notify/tests/sink_tests.rs
// ============================================================================
// Module: Event Sink Tests
// Description: Tests for the channel and log event sinks.
// Purpose: Validate non-blocking delivery, ordering, and failure reporting.
// Dependencies: countersign-core, countersign-notify, serde_json, tokio
// ============================================================================

//! ## Overview
//! Exercises [`countersign_notify::ChannelSink`] and
//! [`countersign_notify::LogSink`]: delivery and ordering on the happy path,
//! full-channel and dropped-receiver failures, JSON line formatting, and
//! write-error reporting.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use countersign_core::DocumentId;
use countersign_core::EnvelopeEvent;
use countersign_core::EnvelopeId;
use countersign_core::EnvelopeStatus;
use countersign_core::EventError;
use countersign_core::EventSink;
use countersign_core::Timestamp;
use countersign_notify::ChannelSink;
use countersign_notify::LogSink;
use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sample_event(envelope_id: &str, status: EnvelopeStatus) -> EnvelopeEvent {
    EnvelopeEvent {
        envelope_id: EnvelopeId::new(envelope_id),
        document_id: DocumentId::new("doc-1"),
        status,
        occurred_at: Timestamp::from_unix_millis(1_000),
    }
}

/// An in-memory writer tests can read back.
#[derive(Clone)]
struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn to_string_lossy(&self) -> String {
        let guard = self.inner.lock().expect("buffer lock");
        String::from_utf8_lossy(&guard).to_string()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A writer that always fails, for testing error paths.
struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("simulated write failure"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Tests that the channel sink delivers the published event.
#[test]
fn channel_sink_delivers_event() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<EnvelopeEvent>(4);
    let sink = ChannelSink::new(tx);

    let event = sample_event("env-1", EnvelopeStatus::Completed);
    sink.publish(&event).expect("publish");

    let received = rx.try_recv().expect("recv");
    assert_eq!(received, event);
}

/// Tests that events arrive on the receiver in publish order.
#[test]
fn channel_sink_preserves_publish_order() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<EnvelopeEvent>(8);
    let sink = ChannelSink::new(tx);

    for id in ["env-1", "env-2", "env-3"] {
        sink.publish(&sample_event(id, EnvelopeStatus::Expired)).expect("publish");
    }

    for id in ["env-1", "env-2", "env-3"] {
        let received = rx.try_recv().expect("recv");
        assert_eq!(received.envelope_id, EnvelopeId::new(id));
    }
}

/// Tests that a full channel fails without blocking.
#[test]
fn channel_sink_fails_when_channel_full() {
    let (tx, _rx) = tokio::sync::mpsc::channel::<EnvelopeEvent>(1);
    let sink = ChannelSink::new(tx);

    let event = sample_event("env-1", EnvelopeStatus::Completed);
    sink.publish(&event).expect("first publish");

    let err = sink.publish(&event).unwrap_err();
    assert!(matches!(err, EventError::PublishFailed(_)));
    assert!(err.to_string().contains("no available capacity"));
}

/// Tests that a dropped receiver fails the publish.
#[test]
fn channel_sink_fails_when_receiver_dropped() {
    let (tx, rx) = tokio::sync::mpsc::channel::<EnvelopeEvent>(1);
    let sink = ChannelSink::new(tx);
    drop(rx);

    let err = sink.publish(&sample_event("env-1", EnvelopeStatus::Declined)).unwrap_err();
    assert!(matches!(err, EventError::PublishFailed(_)));
}

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Tests that the log sink writes one parseable JSON record.
#[test]
fn log_sink_writes_json_record() {
    let buffer = SharedBuffer::new();
    let sink = LogSink::new(buffer.clone());

    sink.publish(&sample_event("env-1", EnvelopeStatus::Completed)).expect("publish");

    let output = buffer.to_string_lossy();
    let record: Value = serde_json::from_str(output.trim_end()).expect("parse json");
    assert_eq!(record["envelope_id"], "env-1");
    assert_eq!(record["document_id"], "doc-1");
    assert_eq!(record["status"], "completed");
    assert_eq!(record["occurred_at"], 1_000);
}

/// Tests that each record lands on its own line.
#[test]
fn log_sink_writes_newline_after_each_record() {
    let buffer = SharedBuffer::new();
    let sink = LogSink::new(buffer.clone());

    sink.publish(&sample_event("env-1", EnvelopeStatus::Completed)).expect("publish");
    sink.publish(&sample_event("env-2", EnvelopeStatus::Revoked)).expect("publish");

    let output = buffer.to_string_lossy();
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let _: Value = serde_json::from_str(line).expect("parse json line");
    }
}

/// Tests that every terminal status keeps its canonical label in the record.
#[test]
fn log_sink_serializes_status_labels() {
    let statuses = [
        (EnvelopeStatus::Completed, "completed"),
        (EnvelopeStatus::Declined, "declined"),
        (EnvelopeStatus::Revoked, "revoked"),
        (EnvelopeStatus::Expired, "expired"),
        (EnvelopeStatus::Archived, "archived"),
    ];
    for (status, label) in statuses {
        let buffer = SharedBuffer::new();
        let sink = LogSink::new(buffer.clone());
        sink.publish(&sample_event("env-1", status)).expect("publish");

        let output = buffer.to_string_lossy();
        let record: Value = serde_json::from_str(output.trim_end()).expect("parse json");
        assert_eq!(record["status"], label);
    }
}

/// Tests that a write failure is reported as a publish error.
#[test]
fn log_sink_fails_on_write_error() {
    let sink = LogSink::new(FailingWriter);

    let err = sink.publish(&sample_event("env-1", EnvelopeStatus::Completed)).unwrap_err();
    assert!(matches!(err, EventError::PublishFailed(_)));
}
