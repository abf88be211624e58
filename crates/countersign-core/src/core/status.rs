// crates/countersign-core/src/core/status.rs
// ============================================================================
// Module: Countersign Status Model
// Description: Closed lifecycle status enumerations for documents, envelopes, and signers.
// Purpose: Make every legal status representable and every illegal one unrepresentable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Lifecycle statuses are closed enumerations rather than free-form strings.
//! Terminal-ness is defined here and nowhere else; the state machine in
//! [`crate::runtime::lifecycle`] is the only component allowed to translate a
//! signer-status multiset into an envelope or document status.
//!
//! Invariants:
//! - Terminal envelope statuses are absorbing; the single exception is
//!   `Completed` → `Archived`, performed only by the archival sweep.
//! - A signer leaves `Pending` exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Document Status
// ============================================================================

/// Document lifecycle status, mirroring the document's single envelope.
///
/// # Invariants
/// - Variants are stable for serialization and audit matching.
/// - A document with no envelope stays `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Registered; no envelope sent yet.
    Draft,
    /// Envelope sent and awaiting signer actions.
    Sent,
    /// Every signer signed.
    Completed,
    /// At least one signer declined.
    Declined,
    /// Manually revoked by the sender.
    Revoked,
    /// Passed its envelope deadline and resolved by the expiration sweep.
    Expired,
    /// Retained past the retention window and moved to archival storage.
    Archived,
}

impl DocumentStatus {
    /// Returns the canonical lower-case label for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Envelope Status
// ============================================================================

/// Envelope lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and audit matching.
/// - `Pending` means created but not sent; `InProgress` means sent and open
///   for signer actions. Both are the only non-terminal statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Created with signers attached; not yet sent.
    Pending,
    /// Sent; signer actions are accepted.
    InProgress,
    /// Every signer signed.
    Completed,
    /// At least one signer declined.
    Declined,
    /// Manually revoked by the sender.
    Revoked,
    /// Passed its deadline and resolved by the expiration sweep.
    Expired,
    /// Completed envelope moved to archival storage by the archival sweep.
    Archived,
}

impl EnvelopeStatus {
    /// Returns true when no further signer action may change this envelope.
    ///
    /// `Completed` is terminal for signer actions even though the archival
    /// sweep may still move it to `Archived`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Declined | Self::Revoked | Self::Expired | Self::Archived
        )
    }

    /// Returns the canonical lower-case label for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Signer Status
// ============================================================================

/// Signer lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and audit matching.
/// - The only legal transitions leave `Pending`; every other status is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    /// Awaiting the signer's action.
    Pending,
    /// Signed; a signature record exists.
    Signed,
    /// Declined.
    Declined,
    /// Resolved by a manual envelope revocation before acting.
    Revoked,
    /// Resolved by the expiration sweep before acting.
    Expired,
}

impl SignerStatus {
    /// Returns true when the signer has reached a final status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the canonical lower-case label for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Signature Kind
// ============================================================================

/// Capture method for a signature field or a completed signature.
///
/// # Invariants
/// - Variants are stable for serialization; the rendering collaborator owns
///   their visual interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// One-click acceptance.
    Click,
    /// Hand-drawn signature.
    Draw,
    /// Typed name rendered in a signature font.
    Type,
    /// Uploaded signature image.
    Image,
    /// Initials.
    Initial,
    /// Date stamp.
    Date,
    /// Full signature block.
    Signature,
}

impl SignatureKind {
    /// Returns the canonical lower-case label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Draw => "draw",
            Self::Type => "type",
            Self::Image => "image",
            Self::Initial => "initial",
            Self::Date => "date",
            Self::Signature => "signature",
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
