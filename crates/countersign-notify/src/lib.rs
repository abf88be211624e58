// crates/countersign-notify/src/lib.rs
// ============================================================================
// Module: Countersign Notify Library
// Description: Reference EventSink implementations for committed transitions.
// Purpose: Deliver terminal envelope events to channels and logs.
// Dependencies: countersign-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! This crate carries the reference implementations of the
//! [`countersign_core::EventSink`] seam: [`ChannelSink`] for in-process
//! consumers behind a bounded `tokio` channel and [`LogSink`] for
//! newline-delimited JSON records on any `io::Write` destination. Delivery
//! transports that leave the process (HTTP webhooks and the like) belong to
//! embedders; they consume these sinks rather than live here.
//! Invariants:
//! - Sinks observe events only after the producing commit is durable.
//! - A sink failure is reported to the publisher and never undoes state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::sink::ChannelSink;
pub use crate::sink::LogSink;
