// crates/countersign-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: Countersign Lifecycle Logic
// Description: Pure derivation of envelope and document status from signer statuses.
// Purpose: Serve as the single authority translating signer outcomes into lifecycle status.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Status derivation is a pure function over the signer-status multiset, the
//! caller-supplied clock value, the optional deadline, and the current
//! envelope status. No other component may write an envelope or document
//! status except through this derivation, the explicit send/revoke
//! operations, and the sweeps acting on an [`LifecycleOutcome::ExpiryDue`]
//! signal.
//!
//! Rule precedence, first match wins:
//! 1. A terminal current status other than `Completed` is absorbing.
//! 2. All signers signed yields `Completed`.
//! 3. Any signer declined yields `Declined`.
//! 4. A passed deadline on an open envelope signals `ExpiryDue`.
//! 5. Otherwise `InProgress` once any signer has acted, else `Pending`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::DocumentStatus;
use crate::core::EnvelopeStatus;
use crate::core::SignerStatus;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Lifecycle Outcome
// ============================================================================

/// Result of a status derivation.
///
/// # Invariants
/// - `ExpiryDue` is a signal, not a status: the caller must run the expiry
///   transition (expiration sweep) or reject the triggering action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Envelope settles at the given status.
    Settled(EnvelopeStatus),
    /// Envelope is past its deadline and awaits the expiry transition.
    ExpiryDue,
}

// ============================================================================
// SECTION: Status Derivation
// ============================================================================

/// Derives the envelope status from the signer-status multiset.
///
/// The derivation is total: every input yields an outcome and no input
/// panics. An empty signer set never completes an envelope.
#[must_use]
pub fn derive_envelope_status(
    signer_statuses: &[SignerStatus],
    now: Timestamp,
    expires_at: Option<Timestamp>,
    current: EnvelopeStatus,
) -> LifecycleOutcome {
    if current.is_terminal() && current != EnvelopeStatus::Completed {
        return LifecycleOutcome::Settled(current);
    }
    if !signer_statuses.is_empty()
        && signer_statuses.iter().all(|status| *status == SignerStatus::Signed)
    {
        return LifecycleOutcome::Settled(EnvelopeStatus::Completed);
    }
    if signer_statuses.iter().any(|status| *status == SignerStatus::Declined) {
        return LifecycleOutcome::Settled(EnvelopeStatus::Declined);
    }
    if let Some(deadline) = expires_at
        && now > deadline
        && matches!(current, EnvelopeStatus::Pending | EnvelopeStatus::InProgress)
    {
        return LifecycleOutcome::ExpiryDue;
    }
    if signer_statuses.iter().any(|status| *status != SignerStatus::Pending) {
        LifecycleOutcome::Settled(EnvelopeStatus::InProgress)
    } else {
        LifecycleOutcome::Settled(EnvelopeStatus::Pending)
    }
}

/// Maps an envelope status onto the mirroring document status.
///
/// The open statuses map to `Sent` because the mapping is applied only to
/// envelopes that have been sent; an unsent envelope's document stays
/// `Draft` by never being remapped.
#[must_use]
pub const fn document_status_for(envelope_status: EnvelopeStatus) -> DocumentStatus {
    match envelope_status {
        EnvelopeStatus::Pending | EnvelopeStatus::InProgress => DocumentStatus::Sent,
        EnvelopeStatus::Completed => DocumentStatus::Completed,
        EnvelopeStatus::Declined => DocumentStatus::Declined,
        EnvelopeStatus::Revoked => DocumentStatus::Revoked,
        EnvelopeStatus::Expired => DocumentStatus::Expired,
        EnvelopeStatus::Archived => DocumentStatus::Archived,
    }
}

/// Maps a resolving envelope status onto the status its unresolved signers
/// take: a manual revocation revokes pending signers, a sweep expiry expires
/// them. Other statuses leave signers untouched.
#[must_use]
pub const fn signer_resolution_for(envelope_status: EnvelopeStatus) -> Option<SignerStatus> {
    match envelope_status {
        EnvelopeStatus::Revoked => Some(SignerStatus::Revoked),
        EnvelopeStatus::Expired => Some(SignerStatus::Expired),
        EnvelopeStatus::Pending
        | EnvelopeStatus::InProgress
        | EnvelopeStatus::Completed
        | EnvelopeStatus::Declined
        | EnvelopeStatus::Archived => None,
    }
}
