// crates/countersign-core/src/lib.rs
// ============================================================================
// Module: Countersign Core Library
// Description: Envelope lifecycle model, completion engine, and interface seams.
// Purpose: Drive multi-party signing workflows to consistent terminal outcomes.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Countersign wraps an uploaded document in an envelope addressed to one or
//! more signers, each of whom must sign or decline before the envelope and
//! its document settle. This crate carries the whole engine: the core data
//! model, the pure status derivation, the [`EnvelopeEngine`] operations with
//! their audit trail, the reconciliation sweeps, and the seams
//! ([`CaseStore`], [`ArchiveStore`], [`EventSink`]) that storage and
//! delivery backends implement.
//! Invariants:
//! - Envelope status is a pure function of signer statuses plus time; only
//!   the explicit send and revoke operations and the sweeps set it directly.
//! - Every state-changing operation commits its audit rows in the same
//!   store transaction; terminal statuses absorb all later actions.
//! - Nothing in this crate reads the wall clock; every request carries
//!   `now`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::ArtifactRef;
pub use crate::core::AuditAction;
pub use crate::core::AuditActor;
pub use crate::core::AuditEntry;
pub use crate::core::AuditRecord;
pub use crate::core::Document;
pub use crate::core::DocumentId;
pub use crate::core::DocumentStatus;
pub use crate::core::Envelope;
pub use crate::core::EnvelopeId;
pub use crate::core::EnvelopeStatus;
pub use crate::core::FieldDraft;
pub use crate::core::FieldId;
pub use crate::core::OrgId;
pub use crate::core::Signature;
pub use crate::core::SignatureField;
pub use crate::core::SignatureKind;
pub use crate::core::Signer;
pub use crate::core::SignerDraft;
pub use crate::core::SignerId;
pub use crate::core::SignerStatus;
pub use crate::core::SigningCase;
pub use crate::core::Timestamp;
pub use crate::core::ValidationError;
pub use crate::interfaces::ArchiveError;
pub use crate::interfaces::ArchiveStore;
pub use crate::interfaces::CaseCommit;
pub use crate::interfaces::CaseStore;
pub use crate::interfaces::CaseUpdate;
pub use crate::interfaces::EnvelopeEvent;
pub use crate::interfaces::EventError;
pub use crate::interfaces::EventSink;
pub use crate::interfaces::NoopEventSink;
pub use crate::interfaces::StoreError;
pub use crate::runtime::ActionReceipt;
pub use crate::runtime::CreateEnvelopeRequest;
pub use crate::runtime::DEFAULT_RETENTION_MS;
pub use crate::runtime::DocumentReceipt;
pub use crate::runtime::EngineConfig;
pub use crate::runtime::EngineError;
pub use crate::runtime::EnvelopeEngine;
pub use crate::runtime::EnvelopeEngineBuilder;
pub use crate::runtime::EnvelopeReceipt;
pub use crate::runtime::FieldReceipt;
pub use crate::runtime::InMemoryArchiveStore;
pub use crate::runtime::InMemoryCaseStore;
pub use crate::runtime::LifecycleOutcome;
pub use crate::runtime::PlaceFieldRequest;
pub use crate::runtime::RegisterDocumentRequest;
pub use crate::runtime::RemoveFieldRequest;
pub use crate::runtime::ResendInvitationRequest;
pub use crate::runtime::ResendReceipt;
pub use crate::runtime::RevokeEnvelopeRequest;
pub use crate::runtime::RevokeReceipt;
pub use crate::runtime::SendEnvelopeRequest;
pub use crate::runtime::SendReceipt;
pub use crate::runtime::SignerActionRequest;
pub use crate::runtime::SignerContact;
pub use crate::runtime::SignerOutcome;
pub use crate::runtime::SweepFailure;
pub use crate::runtime::SweepReport;
pub use crate::runtime::derive_envelope_status;
pub use crate::runtime::document_status_for;
pub use crate::runtime::signer_resolution_for;
