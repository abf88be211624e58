// crates/countersign-core/src/core/audit.rs
// ============================================================================
// Module: Countersign Audit Trail
// Description: Append-only audit actions, actors, and records.
// Purpose: Capture every status transition for reporting independent of entity state.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The audit trail is the system's source of truth for what happened and
//! when. Entries are appended in the same store transaction as the status
//! change they describe and are never updated or deleted. Readers scan per
//! document in sequence order, which equals commit order.
//!
//! Invariants:
//! - One entry per logical transition; the envelope and its mirroring
//!   document count as one transition.
//! - `seq` is assigned by the store at commit and is monotonic store-wide.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DocumentId;
use crate::core::identifiers::EnvelopeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Audit Actions
// ============================================================================

/// Action tags recorded in the audit trail.
///
/// # Invariants
/// - Variants are stable for serialization and reporting queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Document registered in draft.
    DocumentUploaded,
    /// Envelope created with signers attached.
    EnvelopeCreated,
    /// Envelope sent to its signers.
    EnvelopeSent,
    /// Invitation re-sent to a pending signer.
    InvitationResent,
    /// A signer signed.
    DocumentSigned,
    /// A signer declined.
    SignerDeclined,
    /// Envelope completed (all signers signed).
    EnvelopeCompleted,
    /// Envelope declined (a signer declined).
    EnvelopeDeclined,
    /// Envelope manually revoked.
    EnvelopeRevoked,
    /// Envelope resolved by the expiration sweep.
    EnvelopeExpired,
    /// Completed envelope moved to archival storage.
    DocumentArchived,
}

impl AuditAction {
    /// Returns the canonical lower-case label for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocumentUploaded => "document_uploaded",
            Self::EnvelopeCreated => "envelope_created",
            Self::EnvelopeSent => "envelope_sent",
            Self::InvitationResent => "invitation_resent",
            Self::DocumentSigned => "document_signed",
            Self::SignerDeclined => "signer_declined",
            Self::EnvelopeCompleted => "envelope_completed",
            Self::EnvelopeDeclined => "envelope_declined",
            Self::EnvelopeRevoked => "envelope_revoked",
            Self::EnvelopeExpired => "envelope_expired",
            Self::DocumentArchived => "document_archived",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Audit Actors
// ============================================================================

/// Identity that performed an audited action.
///
/// # Invariants
/// - Variants are stable for serialization and reporting queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditActor {
    /// Authenticated user, identified by the caller-resolved user id.
    User(String),
    /// Signer acting on an envelope, identified by lower-cased email.
    Signer(String),
    /// Countersign itself (reconciliation sweeps).
    System,
}

// ============================================================================
// SECTION: Audit Records
// ============================================================================

/// Audit entry describing one logical transition, before the store assigns
/// its sequence number.
///
/// # Invariants
/// - `document_id` always refers to an existing document; `envelope_id` is
///   absent only for document-level actions taken before an envelope exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Document the action concerns.
    pub document_id: DocumentId,
    /// Envelope the action concerns, when one exists.
    pub envelope_id: Option<EnvelopeId>,
    /// Action tag.
    pub action: AuditAction,
    /// Performing identity.
    pub actor: AuditActor,
    /// Action timestamp, supplied by the caller.
    pub recorded_at: Timestamp,
    /// Free-form structured details.
    pub details: Option<serde_json::Value>,
}

/// Audit entry as persisted, with the store-assigned sequence number.
///
/// # Invariants
/// - `seq` is monotonic store-wide and equals commit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic sequence number assigned by the store.
    pub seq: u64,
    /// Audit entry.
    pub entry: AuditEntry,
}
