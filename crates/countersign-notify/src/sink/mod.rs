// crates/countersign-notify/src/sink/mod.rs
// ============================================================================
// Module: Countersign Event Sinks
// Description: Reference EventSink implementations for committed transitions.
// Purpose: Hand terminal envelope events to in-process consumers and logs.
// Dependencies: countersign-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Sinks receive [`countersign_core::EnvelopeEvent`] values through the
//! [`countersign_core::EventSink`] seam. The engine publishes only after the
//! transition is durably committed, so a sink failure is reported to the
//! caller but never rolls anything back; consumers needing stronger
//! guarantees re-query the store.
//! Invariants:
//! - Sinks never block the publishing thread; a full channel is an
//!   immediate error, not a wait.
//! - One event maps to at most one channel message or log line.

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod channel;
pub mod log;

pub use channel::ChannelSink;
pub use log::LogSink;
