// crates/countersign-core/src/core/time.rs
// ============================================================================
// Module: Countersign Time Model
// Description: Canonical timestamp representation for lifecycle and audit records.
// Purpose: Provide deterministic, caller-supplied time values across Countersign records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Countersign uses explicit time values carried on requests and sweep
//! invocations to keep every lifecycle decision deterministic. The engine
//! never reads wall-clock time directly; hosts supply timestamps through
//! request fields, which makes expiry and retention logic drivable from a
//! timer, an orchestrator, or a test harness advancing virtual time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in Countersign entities and audit records, as
/// unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the engine never reads
///   wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp advanced by `millis`, saturating at the
    /// representable bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns this timestamp moved back by `millis`, saturating at the
    /// representable bounds.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = i128::from(self.0).saturating_mul(1_000_000);
        match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
            Ok(value) => match value.format(&Rfc3339) {
                Ok(text) => f.write_str(&text),
                Err(_) => self.0.fmt(f),
            },
            Err(_) => self.0.fmt(f),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
