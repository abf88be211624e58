// crates/countersign-notify/src/sink/channel.rs
// ============================================================================
// Module: Channel Event Sink
// Description: Bounded-channel EventSink for in-process consumers.
// Purpose: Forward committed envelope events without blocking the engine.
// Dependencies: countersign-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelSink`] forwards each published event into a bounded
//! `tokio::sync::mpsc` channel via `try_send`. The sink never waits: a full
//! channel or a dropped receiver surfaces as
//! [`countersign_core::EventError::PublishFailed`] and the caller decides
//! whether the loss matters. Events arrive on the receiver in publish order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use countersign_core::EnvelopeEvent;
use countersign_core::EventError;
use countersign_core::EventSink;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Channel Sink
// ============================================================================

/// Event sink backed by a bounded in-process channel.
///
/// # Invariants
/// - `publish` never blocks; backpressure is an error, not a wait.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    /// Sending half of the consumer channel.
    sender: mpsc::Sender<EnvelopeEvent>,
}

impl ChannelSink {
    /// Creates a sink that forwards events into the given channel.
    #[must_use]
    pub const fn new(sender: mpsc::Sender<EnvelopeEvent>) -> Self {
        Self {
            sender,
        }
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &EnvelopeEvent) -> Result<(), EventError> {
        self.sender
            .try_send(event.clone())
            .map_err(|err| EventError::PublishFailed(err.to_string()))
    }
}
