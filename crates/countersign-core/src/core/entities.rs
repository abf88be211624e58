// crates/countersign-core/src/core/entities.rs
// ============================================================================
// Module: Countersign Entities
// Description: Document, envelope, signer, field, and signature records.
// Purpose: Capture the persistent signing state mutated only through engine transactions.
// Dependencies: crate::core::{identifiers, status, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! Entity records are owned by the case store and mutated only inside the
//! transactions driven by [`crate::runtime::EnvelopeEngine`]. Construction
//! boundaries validate what client input can get wrong (signer contact data,
//! field geometry); lifecycle invariants are enforced by the engine, never by
//! these types.
//!
//! Invariants:
//! - A signer embeds at most one [`Signature`]; creating it is the one-shot
//!   action that flips the signer to `Signed`.
//! - Signer order within an envelope is stable for deterministic iteration;
//!   the order itself carries no workflow meaning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ArtifactRef;
use crate::core::identifiers::DocumentId;
use crate::core::identifiers::EnvelopeId;
use crate::core::identifiers::FieldId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::SignerId;
use crate::core::status::DocumentStatus;
use crate::core::status::EnvelopeStatus;
use crate::core::status::SignatureKind;
use crate::core::status::SignerStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Errors raised when client-supplied drafts fail construction checks.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Document registration data is invalid.
    #[error("invalid document: {0}")]
    Document(String),
    /// Signer contact data is invalid.
    #[error("invalid signer: {0}")]
    Signer(String),
    /// Signature field placement is invalid.
    #[error("invalid signature field: {0}")]
    Field(String),
    /// Envelope composition is invalid.
    #[error("invalid envelope: {0}")]
    Envelope(String),
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Uploaded document registered with the engine.
///
/// # Invariants
/// - `status` mirrors the document's single envelope once one exists; with no
///   envelope it stays `Draft`.
/// - Never deleted while referenced by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub document_id: DocumentId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display title.
    pub title: String,
    /// Reference to the stored file artifact.
    pub file_ref: ArtifactRef,
    /// Lifecycle status.
    pub status: DocumentStatus,
    /// Registration timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Signature Field
// ============================================================================

/// Geometric placement of a signature capture area on a document page.
///
/// # Invariants
/// - `page` is 1-based; geometry is finite with positive width and height
///   (checked at [`FieldDraft`] construction).
/// - Immutable once placed, except removal while the envelope is unsent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureField {
    /// Field identifier.
    pub field_id: FieldId,
    /// Owning signer.
    pub signer_id: SignerId,
    /// 1-based page number.
    pub page: u32,
    /// Horizontal position on the page.
    pub x: f64,
    /// Vertical position on the page.
    pub y: f64,
    /// Field width.
    pub width: f64,
    /// Field height.
    pub height: f64,
    /// Capture method the field asks for.
    pub kind: SignatureKind,
}

/// Validated draft for placing a signature field.
///
/// # Invariants
/// - Construction enforces the geometry rules, so every draft converts into a
///   legal [`SignatureField`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDraft {
    /// Field identifier.
    field_id: FieldId,
    /// 1-based page number.
    page: u32,
    /// Horizontal position on the page.
    x: f64,
    /// Vertical position on the page.
    y: f64,
    /// Field width.
    width: f64,
    /// Field height.
    height: f64,
    /// Capture method the field asks for.
    kind: SignatureKind,
}

impl FieldDraft {
    /// Creates a field draft after validating page and geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Field`] when the page is zero, any
    /// coordinate is non-finite, or width/height is not strictly positive.
    pub fn new(
        field_id: FieldId,
        page: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        kind: SignatureKind,
    ) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::Field("page numbers are 1-based".to_string()));
        }
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(ValidationError::Field("geometry must be finite".to_string()));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(ValidationError::Field(
                "width and height must be positive".to_string(),
            ));
        }
        Ok(Self {
            field_id,
            page,
            x,
            y,
            width,
            height,
            kind,
        })
    }

    /// Returns the draft's field identifier.
    #[must_use]
    pub const fn field_id(&self) -> &FieldId {
        &self.field_id
    }

    /// Converts the draft into a field owned by `signer_id`.
    #[must_use]
    pub fn into_field(self, signer_id: SignerId) -> SignatureField {
        SignatureField {
            field_id: self.field_id,
            signer_id,
            page: self.page,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            kind: self.kind,
        }
    }
}

// ============================================================================
// SECTION: Signature
// ============================================================================

/// Completed signature captured for a signer.
///
/// # Invariants
/// - At most one per signer, ever; identified by its signer.
/// - `artifact` points at the rendered artifact produced before the signing
///   transaction by the external rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Owning signer.
    pub signer_id: SignerId,
    /// Rendered signature artifact.
    pub artifact: ArtifactRef,
    /// Capture method used.
    pub method: SignatureKind,
    /// Network origin of the signing request, when known.
    pub origin_addr: Option<String>,
    /// Capture timestamp.
    pub signed_at: Timestamp,
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Party who must sign or decline an envelope's document.
///
/// # Invariants
/// - `email` is stored lower-cased for matching (enforced at
///   [`SignerDraft`] construction).
/// - `status` leaves `Pending` exactly once; `signature` is `Some` iff the
///   status is `Signed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    /// Signer identifier.
    pub signer_id: SignerId,
    /// Owning envelope.
    pub envelope_id: EnvelopeId,
    /// Display name.
    pub name: String,
    /// Lower-cased contact email.
    pub email: String,
    /// Lifecycle status.
    pub status: SignerStatus,
    /// Fields placed for this signer.
    pub fields: Vec<SignatureField>,
    /// Completed signature, if the signer has signed.
    pub signature: Option<Signature>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

/// Validated draft for attaching a signer at envelope creation.
///
/// # Invariants
/// - `email` is lower-cased at construction and validated for shape, so every
///   draft converts into a legal [`Signer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerDraft {
    /// Signer identifier.
    signer_id: SignerId,
    /// Display name.
    name: String,
    /// Lower-cased contact email.
    email: String,
}

impl SignerDraft {
    /// Creates a signer draft, lower-casing the email for matching.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Signer`] when the name is empty or the
    /// email is empty, contains whitespace, or lacks an `@` separator.
    pub fn new(
        signer_id: SignerId,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::Signer("name must not be empty".to_string()));
        }
        let email = email.into().to_lowercase();
        if email.is_empty() {
            return Err(ValidationError::Signer("email must not be empty".to_string()));
        }
        if email.chars().any(char::is_whitespace) || !email.contains('@') {
            return Err(ValidationError::Signer(format!("email is malformed: {email}")));
        }
        Ok(Self {
            signer_id,
            name,
            email,
        })
    }

    /// Returns the draft's signer identifier.
    #[must_use]
    pub const fn signer_id(&self) -> &SignerId {
        &self.signer_id
    }

    /// Returns the lower-cased email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Converts the draft into a pending signer for `envelope_id`.
    #[must_use]
    pub fn into_signer(self, envelope_id: EnvelopeId, now: Timestamp) -> Signer {
        Signer {
            signer_id: self.signer_id,
            envelope_id,
            name: self.name,
            email: self.email,
            status: SignerStatus::Pending,
            fields: Vec::new(),
            signature: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Signing workflow wrapping one document for one or more signers.
///
/// # Invariants
/// - `status` is a pure function of signer statuses plus time, set directly
///   only by the explicit send and revoke operations.
/// - Exactly one envelope per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope identifier.
    pub envelope_id: EnvelopeId,
    /// Wrapped document.
    pub document_id: DocumentId,
    /// Lifecycle status.
    pub status: EnvelopeStatus,
    /// Optional deadline after which the expiration sweep resolves the
    /// envelope.
    pub expires_at: Option<Timestamp>,
    /// Signers in stable creation order.
    pub signers: Vec<Signer>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp; the archival sweep's retention window is
    /// measured against it.
    pub updated_at: Timestamp,
}

impl Envelope {
    /// Returns the current signer-status multiset in stable signer order.
    #[must_use]
    pub fn signer_statuses(&self) -> Vec<SignerStatus> {
        self.signers.iter().map(|signer| signer.status).collect()
    }

    /// Returns the signer with the given identifier, if attached.
    #[must_use]
    pub fn signer(&self, signer_id: &SignerId) -> Option<&Signer> {
        self.signers.iter().find(|signer| &signer.signer_id == signer_id)
    }

    /// Returns the signer with the given identifier mutably, if attached.
    pub fn signer_mut(&mut self, signer_id: &SignerId) -> Option<&mut Signer> {
        self.signers.iter_mut().find(|signer| &signer.signer_id == signer_id)
    }
}

// ============================================================================
// SECTION: Signing Case
// ============================================================================

/// Aggregate loaded and committed as one unit: a document, its envelope with
/// signers embedded, and the optimistic-concurrency version token.
///
/// # Invariants
/// - `version` is the value observed at load; a commit succeeds only while
///   the stored version still matches (no lost updates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningCase {
    /// Document record.
    pub document: Document,
    /// Envelope record with signers embedded.
    pub envelope: Envelope,
    /// Version token for compare-and-swap commits.
    pub version: u64,
}
