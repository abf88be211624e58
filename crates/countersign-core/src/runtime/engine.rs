// crates/countersign-core/src/runtime/engine.rs
// ============================================================================
// Module: Countersign Envelope Engine
// Description: Lifecycle operations and completion aggregation over a case store.
// Purpose: Execute every envelope transition atomically with its audit trail.
// Dependencies: crate::core, crate::interfaces, crate::runtime::lifecycle, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`EnvelopeEngine`] owns every state-changing operation on signing cases:
//! document registration, envelope creation, field placement, send,
//! invitation resend, the signer-action completion aggregator, and manual
//! revocation. The reconciliation sweeps live in
//! [`crate::runtime::sweeps`] as further engine methods.
//! Invariants:
//! - Every state-changing operation commits its entity writes and audit rows
//!   in one store transaction; a failed commit leaves nothing behind.
//! - Envelope status is derived through
//!   [`crate::runtime::lifecycle::derive_envelope_status`]; only send,
//!   revoke, and the sweeps set it directly.
//! - Commit conflicts are retried with bounded linear backoff only for the
//!   completion aggregator; client-caused errors never retry.
//! - Event publication happens after the durable commit and never rolls one
//!   back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::ArtifactRef;
use crate::core::AuditAction;
use crate::core::AuditActor;
use crate::core::AuditEntry;
use crate::core::AuditRecord;
use crate::core::Document;
use crate::core::DocumentId;
use crate::core::DocumentStatus;
use crate::core::Envelope;
use crate::core::EnvelopeId;
use crate::core::EnvelopeStatus;
use crate::core::FieldDraft;
use crate::core::FieldId;
use crate::core::OrgId;
use crate::core::Signature;
use crate::core::SignatureKind;
use crate::core::SignerDraft;
use crate::core::SignerId;
use crate::core::SignerStatus;
use crate::core::SigningCase;
use crate::core::Timestamp;
use crate::core::ValidationError;
use crate::interfaces::ArchiveError;
use crate::interfaces::ArchiveStore;
use crate::interfaces::CaseStore;
use crate::interfaces::CaseUpdate;
use crate::interfaces::EnvelopeEvent;
use crate::interfaces::EventSink;
use crate::interfaces::NoopEventSink;
use crate::interfaces::StoreError;
use crate::runtime::lifecycle::LifecycleOutcome;
use crate::runtime::lifecycle::derive_envelope_status;
use crate::runtime::lifecycle::document_status_for;
use crate::runtime::lifecycle::signer_resolution_for;

// ============================================================================
// SECTION: Engine Errors
// ============================================================================

/// Errors returned by engine operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `NotFound`, `InvalidState`, `AlreadyActed`, and `Validation` are
///   client-caused and never retried.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation is not permitted in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Signer has already acted on the envelope.
    #[error("already acted: {0}")]
    AlreadyActed(String),
    /// Request data failed a construction or composition check.
    #[error("validation failure: {0}")]
    Validation(#[from] ValidationError),
    /// Commit lost its compare-and-swap race, or an identifier uniqueness
    /// rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Case store failure.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    /// Archival storage failure.
    #[error("archive failure: {0}")]
    Archive(#[from] ArchiveError),
    /// Engine builder was finished without a case store.
    #[error("engine case store is not configured")]
    MissingStore,
    /// Engine builder was finished without an archive store.
    #[error("engine archive store is not configured")]
    MissingArchive,
}

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Default completed-envelope retention before archival: seven days.
pub const DEFAULT_RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Tuning knobs for the envelope engine.
///
/// # Invariants
/// - `max_commit_retries` bounds retries of commit conflicts in the
///   completion aggregator only; client-caused errors never retry.
/// - `retention_ms` measures from an envelope's `updated_at`, which for a
///   completed envelope is its completion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Commit retry budget for the completion aggregator.
    pub max_commit_retries: u32,
    /// Linear backoff step between commit retries, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Age a completed envelope must reach before the archival sweep takes
    /// it, in milliseconds.
    pub retention_ms: i64,
    /// Maximum envelopes examined per sweep run.
    pub sweep_batch_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 3,
            retry_backoff_ms: 25,
            retention_ms: DEFAULT_RETENTION_MS,
            sweep_batch_limit: 100,
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Request to register an uploaded document.
#[derive(Debug, Clone)]
pub struct RegisterDocumentRequest {
    /// Identifier for the new document.
    pub document_id: DocumentId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display title.
    pub title: String,
    /// Reference to the uploaded file artifact.
    pub file_ref: ArtifactRef,
    /// Acting user recorded in the audit trail.
    pub actor: String,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to create an envelope around a registered document.
#[derive(Debug, Clone)]
pub struct CreateEnvelopeRequest {
    /// Identifier for the new envelope.
    pub envelope_id: EnvelopeId,
    /// Document the envelope wraps.
    pub document_id: DocumentId,
    /// Signers attached to the envelope; at least one is required.
    pub signers: Vec<SignerDraft>,
    /// Optional deadline after which the expiration sweep resolves the
    /// envelope.
    pub expires_at: Option<Timestamp>,
    /// Acting user recorded in the audit trail.
    pub actor: String,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to place a signature field for a signer.
#[derive(Debug, Clone)]
pub struct PlaceFieldRequest {
    /// Envelope carrying the signer.
    pub envelope_id: EnvelopeId,
    /// Signer the field belongs to.
    pub signer_id: SignerId,
    /// Validated field placement.
    pub field: FieldDraft,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to remove a placed signature field.
#[derive(Debug, Clone)]
pub struct RemoveFieldRequest {
    /// Envelope carrying the field.
    pub envelope_id: EnvelopeId,
    /// Field to remove.
    pub field_id: FieldId,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to send an envelope to its signers.
#[derive(Debug, Clone)]
pub struct SendEnvelopeRequest {
    /// Envelope to send.
    pub envelope_id: EnvelopeId,
    /// Acting user recorded in the audit trail.
    pub actor: String,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to resend an invitation to a pending signer.
#[derive(Debug, Clone)]
pub struct ResendInvitationRequest {
    /// Envelope carrying the signer.
    pub envelope_id: EnvelopeId,
    /// Signer to re-invite.
    pub signer_id: SignerId,
    /// Acting user recorded in the audit trail.
    pub actor: String,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Outcome a signer submits for an envelope.
///
/// # Invariants
/// - `Sign` carries the rendered artifact by construction; a signature
///   without an artifact is unrepresentable.
#[derive(Debug, Clone)]
pub enum SignerOutcome {
    /// Signer signs the document.
    Sign {
        /// Rendered signature artifact produced by the external renderer.
        artifact: ArtifactRef,
        /// Capture method used.
        method: SignatureKind,
    },
    /// Signer declines to sign.
    Decline {
        /// Optional free-form reason recorded in the audit trail.
        reason: Option<String>,
    },
}

/// Request carrying one signer's action into the completion aggregator.
#[derive(Debug, Clone)]
pub struct SignerActionRequest {
    /// Envelope being acted on.
    pub envelope_id: EnvelopeId,
    /// Acting signer.
    pub signer_id: SignerId,
    /// Submitted outcome.
    pub outcome: SignerOutcome,
    /// Network origin of the request, when known.
    pub origin_addr: Option<String>,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

/// Request to revoke an envelope before it resolves.
#[derive(Debug, Clone)]
pub struct RevokeEnvelopeRequest {
    /// Envelope to revoke.
    pub envelope_id: EnvelopeId,
    /// Optional free-form reason recorded in the audit trail.
    pub reason: Option<String>,
    /// Acting user recorded in the audit trail.
    pub actor: String,
    /// Caller-supplied current time.
    pub now: Timestamp,
}

// ============================================================================
// SECTION: Receipts
// ============================================================================

/// Receipt for a registered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReceipt {
    /// Stored document record.
    pub document: Document,
    /// Audit record appended by the registration.
    pub audit: AuditRecord,
}

/// Receipt for a created envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeReceipt {
    /// Stored envelope record with signers embedded.
    pub envelope: Envelope,
    /// Case version after the insert.
    pub version: u64,
    /// Audit records appended by the creation.
    pub audit: Vec<AuditRecord>,
}

/// Receipt for a field placement or removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReceipt {
    /// Envelope the field belongs to.
    pub envelope_id: EnvelopeId,
    /// Signer owning the field.
    pub signer_id: SignerId,
    /// Field placed or removed.
    pub field_id: FieldId,
    /// Case version after the commit.
    pub version: u64,
}

/// Contact details the out-of-scope notifier needs to deliver an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerContact {
    /// Signer identifier.
    pub signer_id: SignerId,
    /// Display name.
    pub name: String,
    /// Lower-cased contact email.
    pub email: String,
}

/// Receipt for a sent envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Sent envelope.
    pub envelope_id: EnvelopeId,
    /// Envelope status after the send.
    pub envelope_status: EnvelopeStatus,
    /// Document status after the send.
    pub document_status: DocumentStatus,
    /// Case version after the commit.
    pub version: u64,
    /// Contacts to deliver invitations to, in signer order.
    pub invitations: Vec<SignerContact>,
    /// Audit records appended by the send.
    pub audit: Vec<AuditRecord>,
}

/// Receipt for a resent invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendReceipt {
    /// Envelope carrying the signer.
    pub envelope_id: EnvelopeId,
    /// Contact to redeliver the invitation to.
    pub contact: SignerContact,
    /// Case version after the commit.
    pub version: u64,
    /// Audit records appended by the resend.
    pub audit: Vec<AuditRecord>,
}

/// Receipt for a signer action processed by the completion aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReceipt {
    /// Envelope acted on.
    pub envelope_id: EnvelopeId,
    /// Acting signer.
    pub signer_id: SignerId,
    /// Signer status after the action.
    pub signer_status: SignerStatus,
    /// Envelope status after the action.
    pub envelope_status: EnvelopeStatus,
    /// Document status after the action.
    pub document_status: DocumentStatus,
    /// Case version after the commit.
    pub version: u64,
    /// Audit records appended by the action, in sequence order.
    pub audit: Vec<AuditRecord>,
    /// Terminal transition event produced by the action, if the action
    /// resolved the envelope.
    pub transition: Option<EnvelopeEvent>,
    /// True when `transition` was accepted by the event sink.
    pub event_published: bool,
}

/// Receipt for a revoked envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeReceipt {
    /// Revoked envelope.
    pub envelope_id: EnvelopeId,
    /// Envelope status after the revocation.
    pub envelope_status: EnvelopeStatus,
    /// Document status after the revocation.
    pub document_status: DocumentStatus,
    /// Case version after the commit.
    pub version: u64,
    /// Audit records appended by the revocation.
    pub audit: Vec<AuditRecord>,
    /// True when the terminal transition event was accepted by the sink.
    pub event_published: bool,
}

// ============================================================================
// SECTION: Engine Builder
// ============================================================================

/// Builder for an envelope engine.
///
/// # Invariants
/// - `build` succeeds only when a case store and an archive store are
///   configured; the event sink defaults to [`NoopEventSink`].
#[derive(Default)]
pub struct EnvelopeEngineBuilder {
    /// Case store backing every operation.
    store: Option<Arc<dyn CaseStore>>,
    /// Archive store used by the archival sweep.
    archive: Option<Arc<dyn ArchiveStore>>,
    /// Sink receiving terminal-transition events.
    events: Option<Arc<dyn EventSink>>,
    /// Engine tuning knobs.
    config: EngineConfig,
}

impl EnvelopeEngineBuilder {
    /// Registers the case store.
    #[must_use]
    pub fn store(mut self, store: impl CaseStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Registers a shared case store.
    #[must_use]
    pub fn shared_store(mut self, store: Arc<dyn CaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registers the archive store.
    #[must_use]
    pub fn archive(mut self, archive: impl ArchiveStore + 'static) -> Self {
        self.archive = Some(Arc::new(archive));
        self
    }

    /// Registers a shared archive store.
    #[must_use]
    pub fn shared_archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Registers the event sink.
    #[must_use]
    pub fn events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Some(Arc::new(events));
        self
    }

    /// Overrides the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingStore`] or [`EngineError::MissingArchive`]
    /// when a required collaborator is not configured.
    pub fn build(self) -> Result<EnvelopeEngine, EngineError> {
        Ok(EnvelopeEngine {
            store: self.store.ok_or(EngineError::MissingStore)?,
            archive: self.archive.ok_or(EngineError::MissingArchive)?,
            events: self.events.unwrap_or_else(|| Arc::new(NoopEventSink)),
            config: self.config,
        })
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Envelope lifecycle engine wiring the case store, archive store, and event
/// sink behind the operation surface.
///
/// # Invariants
/// - A case store and an archive store are always configured.
/// - All methods take `&self`; the engine is shared across threads as-is.
pub struct EnvelopeEngine {
    /// Case store backing every operation.
    pub(crate) store: Arc<dyn CaseStore>,
    /// Archive store used by the archival sweep.
    pub(crate) archive: Arc<dyn ArchiveStore>,
    /// Sink receiving terminal-transition events.
    pub(crate) events: Arc<dyn EventSink>,
    /// Engine tuning knobs.
    pub(crate) config: EngineConfig,
}

impl EnvelopeEngine {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> EnvelopeEngineBuilder {
        EnvelopeEngineBuilder::default()
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Document registration
    // ------------------------------------------------------------------

    /// Registers an uploaded document in `Draft` status.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the title or file reference
    /// is empty, [`EngineError::Conflict`] when the document id already
    /// exists, or [`EngineError::Storage`] when the store fails.
    pub fn register_document(
        &self,
        request: &RegisterDocumentRequest,
    ) -> Result<DocumentReceipt, EngineError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ValidationError::Document("title must not be empty".to_string()).into());
        }
        if request.file_ref.as_str().trim().is_empty() {
            return Err(
                ValidationError::Document("file reference must not be empty".to_string()).into(),
            );
        }
        let document = Document {
            document_id: request.document_id.clone(),
            org_id: request.org_id.clone(),
            title: title.to_string(),
            file_ref: request.file_ref.clone(),
            status: DocumentStatus::Draft,
            created_at: request.now,
            updated_at: request.now,
        };
        let entry = AuditEntry {
            document_id: request.document_id.clone(),
            envelope_id: None,
            action: AuditAction::DocumentUploaded,
            actor: AuditActor::User(request.actor.clone()),
            recorded_at: request.now,
            details: Some(json!({ "title": title })),
        };
        let audit = self.store.insert_document(&document, &entry).map_err(map_insert_error)?;
        Ok(DocumentReceipt {
            document,
            audit,
        })
    }

    // ------------------------------------------------------------------
    // Envelope creation
    // ------------------------------------------------------------------

    /// Creates a pending envelope with its signers around a registered
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the signer set is empty,
    /// repeats a signer id, or the deadline is not in the future;
    /// [`EngineError::NotFound`] when the document is unknown;
    /// [`EngineError::InvalidState`] when the document already has an
    /// envelope; [`EngineError::Conflict`] when the envelope id is taken; or
    /// [`EngineError::Storage`] when the store fails.
    pub fn create_envelope(
        &self,
        request: &CreateEnvelopeRequest,
    ) -> Result<EnvelopeReceipt, EngineError> {
        if request.signers.is_empty() {
            return Err(ValidationError::Envelope(
                "envelope requires at least one signer".to_string(),
            )
            .into());
        }
        let mut seen = BTreeSet::new();
        for draft in &request.signers {
            if !seen.insert(draft.signer_id().clone()) {
                return Err(ValidationError::Signer(format!(
                    "duplicate signer id: {}",
                    draft.signer_id()
                ))
                .into());
            }
        }
        if let Some(deadline) = request.expires_at
            && deadline <= request.now
        {
            return Err(ValidationError::Envelope(
                "expiry deadline must be in the future".to_string(),
            )
            .into());
        }
        if self.store.document(&request.document_id)?.is_none() {
            return Err(EngineError::NotFound(format!(
                "document {} is not registered",
                request.document_id
            )));
        }
        if self.store.case_by_document(&request.document_id)?.is_some() {
            return Err(EngineError::InvalidState(format!(
                "document {} already has an envelope",
                request.document_id
            )));
        }
        let signers = request
            .signers
            .iter()
            .map(|draft| draft.clone().into_signer(request.envelope_id.clone(), request.now))
            .collect::<Vec<_>>();
        let envelope = Envelope {
            envelope_id: request.envelope_id.clone(),
            document_id: request.document_id.clone(),
            status: EnvelopeStatus::Pending,
            expires_at: request.expires_at,
            signers,
            created_at: request.now,
            updated_at: request.now,
        };
        let entry = AuditEntry {
            document_id: request.document_id.clone(),
            envelope_id: Some(request.envelope_id.clone()),
            action: AuditAction::EnvelopeCreated,
            actor: AuditActor::User(request.actor.clone()),
            recorded_at: request.now,
            details: Some(json!({ "signer_count": envelope.signers.len() })),
        };
        let commit = self.store.insert_case(&envelope, &entry).map_err(map_insert_error)?;
        Ok(EnvelopeReceipt {
            envelope,
            version: commit.version,
            audit: commit.audit,
        })
    }

    // ------------------------------------------------------------------
    // Field placement
    // ------------------------------------------------------------------

    /// Places a signature field for a signer on an unsent envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope or signer is
    /// unknown, [`EngineError::InvalidState`] unless the envelope is still
    /// pending, [`EngineError::Validation`] when the field id is already
    /// placed, or [`EngineError::Storage`] when the store fails.
    pub fn place_field(&self, request: &PlaceFieldRequest) -> Result<FieldReceipt, EngineError> {
        let mut case = self.load_required(&request.envelope_id)?;
        require_pending_for_fields(&case.envelope)?;
        let field_id = request.field.field_id().clone();
        let already_placed = case
            .envelope
            .signers
            .iter()
            .flat_map(|signer| signer.fields.iter())
            .any(|field| field.field_id == field_id);
        let Some(signer) = case.envelope.signer_mut(&request.signer_id) else {
            return Err(EngineError::NotFound(format!(
                "signer {} is not on envelope {}",
                request.signer_id, request.envelope_id
            )));
        };
        if already_placed {
            return Err(ValidationError::Field(format!(
                "field {field_id} is already placed on envelope {}",
                request.envelope_id
            ))
            .into());
        }
        signer.fields.push(request.field.clone().into_field(request.signer_id.clone()));
        signer.updated_at = request.now;
        case.envelope.updated_at = request.now;
        // Field placement is not a status transition, so no audit entry.
        let commit = self.store.commit_case(&CaseUpdate::new(case, Vec::new()))?;
        Ok(FieldReceipt {
            envelope_id: request.envelope_id.clone(),
            signer_id: request.signer_id.clone(),
            field_id,
            version: commit.version,
        })
    }

    /// Removes a placed signature field from an unsent envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope or field is
    /// unknown, [`EngineError::InvalidState`] unless the envelope is still
    /// pending, or [`EngineError::Storage`] when the store fails.
    pub fn remove_field(&self, request: &RemoveFieldRequest) -> Result<FieldReceipt, EngineError> {
        let mut case = self.load_required(&request.envelope_id)?;
        require_pending_for_fields(&case.envelope)?;
        let mut owner = None;
        for signer in &mut case.envelope.signers {
            if let Some(position) =
                signer.fields.iter().position(|field| field.field_id == request.field_id)
            {
                signer.fields.remove(position);
                signer.updated_at = request.now;
                owner = Some(signer.signer_id.clone());
                break;
            }
        }
        let Some(signer_id) = owner else {
            return Err(EngineError::NotFound(format!(
                "field {} is not placed on envelope {}",
                request.field_id, request.envelope_id
            )));
        };
        case.envelope.updated_at = request.now;
        let commit = self.store.commit_case(&CaseUpdate::new(case, Vec::new()))?;
        Ok(FieldReceipt {
            envelope_id: request.envelope_id.clone(),
            signer_id,
            field_id: request.field_id.clone(),
            version: commit.version,
        })
    }

    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Sends a pending envelope to its signers, moving it in progress and
    /// the document to `Sent`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope is unknown,
    /// [`EngineError::InvalidState`] when the envelope was already sent or
    /// resolved or its deadline has passed, or [`EngineError::Storage`] when
    /// the store fails.
    pub fn send_envelope(&self, request: &SendEnvelopeRequest) -> Result<SendReceipt, EngineError> {
        let mut case = self.load_required(&request.envelope_id)?;
        if case.envelope.status != EnvelopeStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "envelope {} is {} and cannot be sent",
                request.envelope_id,
                case.envelope.status
            )));
        }
        if let Some(deadline) = case.envelope.expires_at
            && request.now > deadline
        {
            return Err(EngineError::InvalidState(format!(
                "envelope {} deadline has passed",
                request.envelope_id
            )));
        }
        case.envelope.status = EnvelopeStatus::InProgress;
        case.envelope.updated_at = request.now;
        case.document.status = DocumentStatus::Sent;
        case.document.updated_at = request.now;
        let invitations = contact_list(&case.envelope);
        let entry = AuditEntry {
            document_id: case.document.document_id.clone(),
            envelope_id: Some(request.envelope_id.clone()),
            action: AuditAction::EnvelopeSent,
            actor: AuditActor::User(request.actor.clone()),
            recorded_at: request.now,
            details: Some(json!({ "signer_count": invitations.len() })),
        };
        let commit = self.store.commit_case(&CaseUpdate::new(case, vec![entry]))?;
        Ok(SendReceipt {
            envelope_id: request.envelope_id.clone(),
            envelope_status: EnvelopeStatus::InProgress,
            document_status: DocumentStatus::Sent,
            version: commit.version,
            invitations,
            audit: commit.audit,
        })
    }

    // ------------------------------------------------------------------
    // Invitation resend
    // ------------------------------------------------------------------

    /// Records an invitation resend for a pending signer on an in-progress
    /// envelope. Audit-only: no status changes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope or signer is
    /// unknown, [`EngineError::InvalidState`] unless the envelope is in
    /// progress, [`EngineError::AlreadyActed`] when the signer has acted, or
    /// [`EngineError::Storage`] when the store fails.
    pub fn resend_invitation(
        &self,
        request: &ResendInvitationRequest,
    ) -> Result<ResendReceipt, EngineError> {
        let case = self.load_required(&request.envelope_id)?;
        if case.envelope.status != EnvelopeStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "envelope {} is {}; invitations can be resent only while in progress",
                request.envelope_id,
                case.envelope.status
            )));
        }
        let Some(signer) = case.envelope.signer(&request.signer_id) else {
            return Err(EngineError::NotFound(format!(
                "signer {} is not on envelope {}",
                request.signer_id, request.envelope_id
            )));
        };
        if signer.status != SignerStatus::Pending {
            return Err(EngineError::AlreadyActed(format!(
                "signer {} has already acted on envelope {}",
                request.signer_id, request.envelope_id
            )));
        }
        let contact = SignerContact {
            signer_id: signer.signer_id.clone(),
            name: signer.name.clone(),
            email: signer.email.clone(),
        };
        let entry = AuditEntry {
            document_id: case.document.document_id.clone(),
            envelope_id: Some(request.envelope_id.clone()),
            action: AuditAction::InvitationResent,
            actor: AuditActor::User(request.actor.clone()),
            recorded_at: request.now,
            details: Some(json!({ "signer_email": contact.email })),
        };
        // The case itself is untouched; the commit appends the audit entry
        // and bumps the version.
        let commit = self.store.commit_case(&CaseUpdate::new(case, vec![entry]))?;
        Ok(ResendReceipt {
            envelope_id: request.envelope_id.clone(),
            contact,
            version: commit.version,
            audit: commit.audit,
        })
    }

    // ------------------------------------------------------------------
    // Completion aggregator
    // ------------------------------------------------------------------

    /// Applies one signer's sign or decline action and settles the envelope
    /// and document statuses in the same commit.
    ///
    /// Commit conflicts and busy signals are retried with bounded linear
    /// backoff, re-loading and re-validating from scratch each attempt, so a
    /// duplicate submission that loses a race surfaces as `AlreadyActed`
    /// rather than a second signature.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope or signer is
    /// unknown, [`EngineError::InvalidState`] when the envelope is unsent,
    /// resolved, or past its deadline, [`EngineError::AlreadyActed`] when
    /// the signer is not pending, [`EngineError::Conflict`] after the retry
    /// budget is exhausted, or [`EngineError::Storage`] when the store
    /// fails.
    pub fn submit_action(
        &self,
        request: &SignerActionRequest,
    ) -> Result<ActionReceipt, EngineError> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_submit_action(request) {
                Err(EngineError::Storage(err))
                    if is_retryable(&err) && attempt < self.config.max_commit_retries =>
                {
                    attempt += 1;
                    let pause = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    thread::sleep(Duration::from_millis(pause));
                }
                Err(EngineError::Storage(err)) if is_retryable(&err) => {
                    return Err(EngineError::Conflict(format!(
                        "envelope {} commit retries exhausted: {err}",
                        request.envelope_id
                    )));
                }
                other => return other,
            }
        }
    }

    /// Runs one completion-aggregation attempt from a fresh load.
    fn try_submit_action(
        &self,
        request: &SignerActionRequest,
    ) -> Result<ActionReceipt, EngineError> {
        let mut case = self.load_required(&request.envelope_id)?;
        if case.envelope.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "envelope {} is {} and accepts no further signer actions",
                request.envelope_id,
                case.envelope.status
            )));
        }
        if case.envelope.status == EnvelopeStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "envelope {} has not been sent",
                request.envelope_id
            )));
        }
        let expires_at = case.envelope.expires_at;
        let previous_status = case.envelope.status;
        let Some(signer) = case.envelope.signer_mut(&request.signer_id) else {
            return Err(EngineError::NotFound(format!(
                "signer {} is not on envelope {}",
                request.signer_id, request.envelope_id
            )));
        };
        if signer.status != SignerStatus::Pending {
            return Err(EngineError::AlreadyActed(format!(
                "signer {} has already acted on envelope {}",
                request.signer_id, request.envelope_id
            )));
        }
        let signer_status = match &request.outcome {
            SignerOutcome::Sign {
                artifact,
                method,
            } => {
                if artifact.as_str().trim().is_empty() {
                    return Err(ValidationError::Signer(
                        "signature artifact reference must not be empty".to_string(),
                    )
                    .into());
                }
                signer.signature = Some(Signature {
                    signer_id: signer.signer_id.clone(),
                    artifact: artifact.clone(),
                    method: *method,
                    origin_addr: request.origin_addr.clone(),
                    signed_at: request.now,
                });
                SignerStatus::Signed
            }
            SignerOutcome::Decline {
                ..
            } => SignerStatus::Declined,
        };
        signer.status = signer_status;
        signer.updated_at = request.now;
        let signer_email = signer.email.clone();

        let statuses = case.envelope.signer_statuses();
        let next = match derive_envelope_status(&statuses, request.now, expires_at, previous_status)
        {
            LifecycleOutcome::ExpiryDue => {
                return Err(EngineError::InvalidState(format!(
                    "envelope {} deadline has passed; the expiration sweep will resolve it",
                    request.envelope_id
                )));
            }
            LifecycleOutcome::Settled(next) => next,
        };
        case.envelope.status = next;
        case.envelope.updated_at = request.now;
        let document_status = document_status_for(next);
        if case.document.status != document_status {
            case.document.status = document_status;
            case.document.updated_at = request.now;
        }

        let actor = AuditActor::Signer(signer_email);
        let mut audit = Vec::with_capacity(2);
        let action_entry = match &request.outcome {
            SignerOutcome::Sign {
                artifact,
                method,
            } => AuditEntry {
                document_id: case.document.document_id.clone(),
                envelope_id: Some(request.envelope_id.clone()),
                action: AuditAction::DocumentSigned,
                actor: actor.clone(),
                recorded_at: request.now,
                details: Some(json!({ "method": method, "artifact": artifact })),
            },
            SignerOutcome::Decline {
                reason,
            } => AuditEntry {
                document_id: case.document.document_id.clone(),
                envelope_id: Some(request.envelope_id.clone()),
                action: AuditAction::SignerDeclined,
                actor: actor.clone(),
                recorded_at: request.now,
                details: Some(json!({ "reason": reason })),
            },
        };
        audit.push(action_entry);
        if next != previous_status {
            let transition_action = if next == EnvelopeStatus::Completed {
                AuditAction::EnvelopeCompleted
            } else {
                AuditAction::EnvelopeDeclined
            };
            audit.push(AuditEntry {
                document_id: case.document.document_id.clone(),
                envelope_id: Some(request.envelope_id.clone()),
                action: transition_action,
                actor,
                recorded_at: request.now,
                details: None,
            });
        }

        let document_id = case.document.document_id.clone();
        let commit = self.store.commit_case(&CaseUpdate::new(case, audit))?;

        let mut transition = None;
        let mut event_published = false;
        if next.is_terminal() {
            let event = EnvelopeEvent {
                envelope_id: request.envelope_id.clone(),
                document_id,
                status: next,
                occurred_at: request.now,
            };
            event_published = self.events.publish(&event).is_ok();
            transition = Some(event);
        }
        Ok(ActionReceipt {
            envelope_id: request.envelope_id.clone(),
            signer_id: request.signer_id.clone(),
            signer_status,
            envelope_status: next,
            document_status,
            version: commit.version,
            audit: commit.audit,
            transition,
            event_published,
        })
    }

    // ------------------------------------------------------------------
    // Revocation
    // ------------------------------------------------------------------

    /// Revokes a non-terminal envelope, resolving its pending signers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope is unknown,
    /// [`EngineError::InvalidState`] when it is already resolved, or
    /// [`EngineError::Storage`] when the store fails.
    pub fn revoke_envelope(
        &self,
        request: &RevokeEnvelopeRequest,
    ) -> Result<RevokeReceipt, EngineError> {
        let mut case = self.load_required(&request.envelope_id)?;
        if case.envelope.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "envelope {} is {} and cannot be revoked",
                request.envelope_id,
                case.envelope.status
            )));
        }
        resolve_open_case(&mut case, EnvelopeStatus::Revoked, request.now);
        let entry = AuditEntry {
            document_id: case.document.document_id.clone(),
            envelope_id: Some(request.envelope_id.clone()),
            action: AuditAction::EnvelopeRevoked,
            actor: AuditActor::User(request.actor.clone()),
            recorded_at: request.now,
            details: Some(json!({ "reason": request.reason })),
        };
        let document_id = case.document.document_id.clone();
        let commit = self.store.commit_case(&CaseUpdate::new(case, vec![entry]))?;
        let event = EnvelopeEvent {
            envelope_id: request.envelope_id.clone(),
            document_id,
            status: EnvelopeStatus::Revoked,
            occurred_at: request.now,
        };
        let event_published = self.events.publish(&event).is_ok();
        Ok(RevokeReceipt {
            envelope_id: request.envelope_id.clone(),
            envelope_status: EnvelopeStatus::Revoked,
            document_status: DocumentStatus::Revoked,
            version: commit.version,
            audit: commit.audit,
            event_published,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Loads the full case for an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the envelope is unknown, or
    /// [`EngineError::Storage`] when the store fails.
    pub fn case(&self, envelope_id: &EnvelopeId) -> Result<SigningCase, EngineError> {
        self.load_required(envelope_id)
    }

    /// Loads the full case for a document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the document has no envelope,
    /// or [`EngineError::Storage`] when the store fails.
    pub fn case_by_document(&self, document_id: &DocumentId) -> Result<SigningCase, EngineError> {
        self.store.case_by_document(document_id)?.ok_or_else(|| {
            EngineError::NotFound(format!("document {document_id} has no envelope"))
        })
    }

    /// Loads a document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the document is unknown, or
    /// [`EngineError::Storage`] when the store fails.
    pub fn document(&self, document_id: &DocumentId) -> Result<Document, EngineError> {
        self.store.document(document_id)?.ok_or_else(|| {
            EngineError::NotFound(format!("document {document_id} is not registered"))
        })
    }

    /// Returns the audit trail for a document in ascending sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the document is unknown, or
    /// [`EngineError::Storage`] when the store fails.
    pub fn audit_trail(&self, document_id: &DocumentId) -> Result<Vec<AuditRecord>, EngineError> {
        if self.store.document(document_id)?.is_none() {
            return Err(EngineError::NotFound(format!(
                "document {document_id} is not registered"
            )));
        }
        Ok(self.store.audit_trail(document_id)?)
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Loads a case or reports the envelope as unknown.
    pub(crate) fn load_required(
        &self,
        envelope_id: &EnvelopeId,
    ) -> Result<SigningCase, EngineError> {
        self.store
            .load_case(envelope_id)?
            .ok_or_else(|| EngineError::NotFound(format!("envelope {envelope_id} is unknown")))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Moves an open case to a terminal resolution, settling its unresolved
/// signers per the resolution mapping.
pub(crate) fn resolve_open_case(case: &mut SigningCase, status: EnvelopeStatus, now: Timestamp) {
    case.envelope.status = status;
    case.envelope.updated_at = now;
    case.document.status = document_status_for(status);
    case.document.updated_at = now;
    if let Some(resolution) = signer_resolution_for(status) {
        for signer in &mut case.envelope.signers {
            if !signer.status.is_terminal() {
                signer.status = resolution;
                signer.updated_at = now;
            }
        }
    }
}

/// Gates field mutation on the envelope still being unsent.
fn require_pending_for_fields(envelope: &Envelope) -> Result<(), EngineError> {
    if envelope.status == EnvelopeStatus::Pending {
        Ok(())
    } else {
        Err(EngineError::InvalidState(format!(
            "envelope {} is {}; fields can change only before sending",
            envelope.envelope_id, envelope.status
        )))
    }
}

/// Builds the invitation contact list in signer order.
fn contact_list(envelope: &Envelope) -> Vec<SignerContact> {
    envelope
        .signers
        .iter()
        .map(|signer| SignerContact {
            signer_id: signer.signer_id.clone(),
            name: signer.name.clone(),
            email: signer.email.clone(),
        })
        .collect()
}

/// Returns true for store errors worth a commit retry.
const fn is_retryable(err: &StoreError) -> bool {
    matches!(err, StoreError::Conflict(_) | StoreError::Busy(_))
}

/// Maps insert-time store rejections onto their engine counterparts.
fn map_insert_error(err: StoreError) -> EngineError {
    match err {
        StoreError::Conflict(detail) => EngineError::Conflict(detail),
        StoreError::NotFound(detail) => EngineError::NotFound(detail),
        other => EngineError::Storage(other),
    }
}
