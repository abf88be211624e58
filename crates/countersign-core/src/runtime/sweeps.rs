// crates/countersign-core/src/runtime/sweeps.rs
// ============================================================================
// Module: Countersign Reconciliation Sweeps
// Description: Expiration and archival sweeps over due envelopes.
// Purpose: Resolve deadline-passed envelopes and retire completed ones idempotently.
// Dependencies: crate::core, crate::interfaces, crate::runtime::engine, serde, serde_json
// ============================================================================

//! ## Overview
//! The sweeps are plain engine methods taking `now`; scheduling is owned by
//! the caller (a timer, an orchestrator, or a test harness). Both sweeps are
//! idempotent under at-least-once invocation.
//! Invariants:
//! - Each candidate envelope is reloaded and re-checked inside its own
//!   transaction scope; stale scan results skip as no-ops.
//! - One envelope's failure never aborts the batch; failures are reported
//!   per envelope.
//! - Commit conflicts are not retried within a run; the next run re-examines
//!   the envelope.
//! - The archival artifact move happens before the status commit and relies
//!   on [`crate::interfaces::ArchiveStore`] idempotence, so a lost commit
//!   race never moves an artifact twice or duplicates an audit row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::core::AuditAction;
use crate::core::AuditActor;
use crate::core::AuditEntry;
use crate::core::EnvelopeId;
use crate::core::EnvelopeStatus;
use crate::core::Timestamp;
use crate::interfaces::CaseUpdate;
use crate::interfaces::EnvelopeEvent;
use crate::runtime::engine::EngineError;
use crate::runtime::engine::EnvelopeEngine;
use crate::runtime::engine::resolve_open_case;

// ============================================================================
// SECTION: Sweep Reports
// ============================================================================

/// One envelope's failure within a sweep run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// Envelope the failure applies to.
    pub envelope_id: EnvelopeId,
    /// Rendered error.
    pub error: String,
}

/// Outcome of one sweep run.
///
/// # Invariants
/// - `scanned == processed + skipped + failures.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Candidates returned by the scan.
    pub scanned: usize,
    /// Envelopes resolved by this run.
    pub processed: usize,
    /// Candidates skipped after the in-transaction re-check.
    pub skipped: usize,
    /// Processed envelopes whose terminal event the sink rejected.
    pub events_unpublished: usize,
    /// Per-envelope failures; the rest of the batch still ran.
    pub failures: Vec<SweepFailure>,
}

/// Per-envelope outcome inside a sweep run.
enum SweepAction {
    /// Envelope was resolved and committed.
    Processed {
        /// True when the terminal event was produced but the sink rejected
        /// it.
        event_unpublished: bool,
    },
    /// Re-check found the envelope no longer due.
    Skipped,
}

// ============================================================================
// SECTION: Sweep Operations
// ============================================================================

impl EnvelopeEngine {
    /// Resolves envelopes whose deadline has passed: envelope, document, and
    /// unresolved signers move to `Expired` with one audit row per envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the candidate scan itself
    /// fails; per-envelope failures are reported in the sweep report
    /// instead.
    pub fn run_expiration_sweep(&self, now: Timestamp) -> Result<SweepReport, EngineError> {
        let candidates = self.store.expired_candidates(now, self.config.sweep_batch_limit)?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        for envelope_id in candidates {
            match self.expire_one(&envelope_id, now) {
                Ok(action) => record(&mut report, action),
                Err(err) => report.failures.push(SweepFailure {
                    envelope_id,
                    error: err.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Expires one candidate envelope after re-checking it is still due.
    fn expire_one(
        &self,
        envelope_id: &EnvelopeId,
        now: Timestamp,
    ) -> Result<SweepAction, EngineError> {
        let Some(mut case) = self.store.load_case(envelope_id)? else {
            return Ok(SweepAction::Skipped);
        };
        let open = matches!(
            case.envelope.status,
            EnvelopeStatus::Pending | EnvelopeStatus::InProgress
        );
        let deadline = case.envelope.expires_at;
        if !open || !deadline.is_some_and(|deadline| deadline <= now) {
            // A concurrent completion, decline, or revocation landed after
            // the scan.
            return Ok(SweepAction::Skipped);
        }
        resolve_open_case(&mut case, EnvelopeStatus::Expired, now);
        let entry = AuditEntry {
            document_id: case.document.document_id.clone(),
            envelope_id: Some(envelope_id.clone()),
            action: AuditAction::EnvelopeExpired,
            actor: AuditActor::System,
            recorded_at: now,
            details: Some(json!({ "deadline": deadline })),
        };
        let document_id = case.document.document_id.clone();
        self.store.commit_case(&CaseUpdate::new(case, vec![entry]))?;
        let event = EnvelopeEvent {
            envelope_id: envelope_id.clone(),
            document_id,
            status: EnvelopeStatus::Expired,
            occurred_at: now,
        };
        let event_unpublished = self.events.publish(&event).is_err();
        Ok(SweepAction::Processed {
            event_unpublished,
        })
    }

    /// Archives completed envelopes older than the retention window: the
    /// document artifact moves to archival storage, then envelope and
    /// document move to `Archived` with one audit row per envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the candidate scan itself
    /// fails; per-envelope failures are reported in the sweep report
    /// instead.
    pub fn run_archival_sweep(&self, now: Timestamp) -> Result<SweepReport, EngineError> {
        let cutoff = now.saturating_sub_millis(self.config.retention_ms);
        let candidates = self.store.archival_candidates(cutoff, self.config.sweep_batch_limit)?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        for envelope_id in candidates {
            match self.archive_one(&envelope_id, cutoff, now) {
                Ok(action) => record(&mut report, action),
                Err(err) => report.failures.push(SweepFailure {
                    envelope_id,
                    error: err.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Archives one candidate envelope after re-checking it is still a
    /// completed case past retention.
    fn archive_one(
        &self,
        envelope_id: &EnvelopeId,
        cutoff: Timestamp,
        now: Timestamp,
    ) -> Result<SweepAction, EngineError> {
        let Some(mut case) = self.store.load_case(envelope_id)? else {
            return Ok(SweepAction::Skipped);
        };
        if case.envelope.status != EnvelopeStatus::Completed
            || case.envelope.updated_at > cutoff
        {
            // Already archived, or touched since the scan.
            return Ok(SweepAction::Skipped);
        }
        // The artifact move precedes the commit; a lost commit race re-runs
        // against the idempotent archive store without a second move.
        let archived = self.archive.archive_artifact(&case.document.file_ref)?;
        case.document.file_ref = archived.clone();
        resolve_open_case(&mut case, EnvelopeStatus::Archived, now);
        let entry = AuditEntry {
            document_id: case.document.document_id.clone(),
            envelope_id: Some(envelope_id.clone()),
            action: AuditAction::DocumentArchived,
            actor: AuditActor::System,
            recorded_at: now,
            details: Some(json!({ "archived_ref": archived })),
        };
        self.store.commit_case(&CaseUpdate::new(case, vec![entry]))?;
        // Completion already produced the envelope's terminal event;
        // archival is housekeeping and publishes nothing.
        Ok(SweepAction::Processed {
            event_unpublished: false,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Folds one envelope's outcome into the running report.
fn record(report: &mut SweepReport, action: SweepAction) {
    match action {
        SweepAction::Processed {
            event_unpublished,
        } => {
            report.processed += 1;
            if event_unpublished {
                report.events_unpublished += 1;
            }
        }
        SweepAction::Skipped => report.skipped += 1,
    }
}
