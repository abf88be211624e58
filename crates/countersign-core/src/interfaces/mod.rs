// crates/countersign-core/src/interfaces/mod.rs
// ============================================================================
// Module: Countersign Interfaces
// Description: Backend-agnostic interfaces for case storage, archival, and events.
// Purpose: Define the contract surfaces used by the Countersign engine.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the engine reaches external systems without
//! embedding backend-specific details. The case store is the only shared
//! mutable resource in the design; implementations must prevent lost updates
//! on concurrent commits against the same envelope and must fail closed on
//! invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ArtifactRef;
use crate::core::AuditEntry;
use crate::core::AuditRecord;
use crate::core::Document;
use crate::core::DocumentId;
use crate::core::Envelope;
use crate::core::EnvelopeId;
use crate::core::EnvelopeStatus;
use crate::core::SigningCase;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Case Store
// ============================================================================

/// Case store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Referenced entity is absent where the operation requires it.
    #[error("case store entity not found: {0}")]
    NotFound(String),
    /// Commit lost a compare-and-swap race or violated a uniqueness rule.
    #[error("case store conflict: {0}")]
    Conflict(String),
    /// Store could not acquire its lock within the configured bound.
    #[error("case store busy: {0}")]
    Busy(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("case store corruption: {0}")]
    Corrupt(String),
    /// Store data is invalid.
    #[error("case store invalid data: {0}")]
    Invalid(String),
    /// Store I/O error.
    #[error("case store io error: {0}")]
    Io(String),
}

/// Unit of work committed atomically: the mutated case plus the audit
/// entries describing its transitions.
///
/// # Invariants
/// - `expected_version` is the value observed at load; the store commits
///   only while the stored version still matches.
/// - `audit` entries land in the same transaction as the entity writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseUpdate {
    /// Mutated case snapshot.
    pub case: SigningCase,
    /// Version observed when the case was loaded.
    pub expected_version: u64,
    /// Audit entries to append with the commit.
    pub audit: Vec<AuditEntry>,
}

impl CaseUpdate {
    /// Builds an update whose expected version is the case's as-loaded
    /// version token.
    #[must_use]
    pub fn new(case: SigningCase, audit: Vec<AuditEntry>) -> Self {
        let expected_version = case.version;
        Self {
            case,
            expected_version,
            audit,
        }
    }
}

/// Outcome of a successful case commit.
///
/// # Invariants
/// - `version` is the stored version after the commit (loaded version + 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseCommit {
    /// New stored version of the case.
    pub version: u64,
    /// Audit records appended by the commit, with assigned sequence numbers.
    pub audit: Vec<AuditRecord>,
}

/// Durable store for documents, signing cases, and the audit trail.
///
/// Implementations must make every mutating method atomic: the entity writes
/// and the audit append either all land or none do.
pub trait CaseStore: Send + Sync {
    /// Inserts a draft document together with its registration audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the document id already exists,
    /// or another [`StoreError`] when the store fails.
    fn insert_document(
        &self,
        document: &Document,
        audit: &AuditEntry,
    ) -> Result<AuditRecord, StoreError>;

    /// Inserts a new signing case: the envelope (signers embedded) bound to
    /// its already-registered document, together with the creation audit
    /// entry. The stored case starts at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the envelope id is taken or the
    /// document already has an envelope, [`StoreError::NotFound`] when the
    /// document is unknown, or another [`StoreError`] when the store fails.
    fn insert_case(
        &self,
        envelope: &Envelope,
        audit: &AuditEntry,
    ) -> Result<CaseCommit, StoreError>;

    /// Loads a document by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn document(&self, document_id: &DocumentId) -> Result<Option<Document>, StoreError>;

    /// Loads the full case (document + envelope + version) by envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_case(&self, envelope_id: &EnvelopeId) -> Result<Option<SigningCase>, StoreError>;

    /// Loads the full case by document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn case_by_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<SigningCase>, StoreError>;

    /// Commits a case update with compare-and-swap semantics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the stored version no longer
    /// matches `update.expected_version` (nothing is written),
    /// [`StoreError::NotFound`] when the case was never inserted, or another
    /// [`StoreError`] when the store fails.
    fn commit_case(&self, update: &CaseUpdate) -> Result<CaseCommit, StoreError>;

    /// Lists envelopes due for the expiration sweep: status pending or
    /// in-progress with a deadline at or before `now`, at most `limit`
    /// identifiers in stable order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn expired_candidates(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError>;

    /// Lists envelopes due for the archival sweep: status completed with
    /// `updated_at` at or before `cutoff`, at most `limit` identifiers in
    /// stable order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn archival_candidates(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError>;

    /// Returns the audit trail for a document in ascending sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn audit_trail(&self, document_id: &DocumentId) -> Result<Vec<AuditRecord>, StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Archive Store
// ============================================================================

/// Archival storage errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Underlying artifact could not be found.
    #[error("artifact missing: {0}")]
    Missing(String),
    /// Archival storage reported an error.
    #[error("artifact archive error: {0}")]
    Archive(String),
}

/// Moves completed artifacts into archival storage.
///
/// Implementations must be idempotent: archiving an artifact that was
/// already moved reports the archived reference again without moving twice.
/// The archival sweep relies on this to survive a crash between the move and
/// the status commit.
pub trait ArchiveStore: Send + Sync {
    /// Moves the artifact into archival storage and returns its archived
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] when the artifact cannot be archived.
    fn archive_artifact(&self, artifact: &ArtifactRef) -> Result<ArtifactRef, ArchiveError>;
}

// ============================================================================
// SECTION: Event Sink
// ============================================================================

/// Envelope terminal-transition event published after commit.
///
/// # Invariants
/// - Emitted only after the transition is durably committed; the store, not
///   the event stream, is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeEvent {
    /// Envelope that transitioned.
    pub envelope_id: EnvelopeId,
    /// Document the envelope wraps.
    pub document_id: DocumentId,
    /// Terminal status reached.
    pub status: EnvelopeStatus,
    /// Transition timestamp.
    pub occurred_at: Timestamp,
}

/// Event sink errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EventError {
    /// Sink rejected or failed to accept the event.
    #[error("event publish failed: {0}")]
    PublishFailed(String),
}

/// Receives envelope terminal-transition events.
///
/// Publication is best-effort: a sink failure never rolls back the commit
/// that produced the event. Consumers needing stronger delivery re-query the
/// store.
pub trait EventSink: Send + Sync {
    /// Publishes one committed transition event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when the sink cannot accept the event.
    fn publish(&self, event: &EnvelopeEvent) -> Result<(), EventError>;
}

/// Event sink that drops every event, for embedders without a consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &EnvelopeEvent) -> Result<(), EventError> {
        Ok(())
    }
}
