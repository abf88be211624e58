// crates/countersign-core/src/core/mod.rs
// ============================================================================
// Module: Countersign Core Model
// Description: Entity, status, identifier, time, and audit model types.
// Purpose: Wire the core data model modules and re-export their public surface.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! The core model is pure data: identifiers, timestamps, status enums, entity
//! records, and audit types. Nothing here performs I/O or reads clocks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod entities;
pub mod identifiers;
pub mod status;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditAction;
pub use audit::AuditActor;
pub use audit::AuditEntry;
pub use audit::AuditRecord;
pub use entities::Document;
pub use entities::Envelope;
pub use entities::FieldDraft;
pub use entities::Signature;
pub use entities::SignatureField;
pub use entities::Signer;
pub use entities::SignerDraft;
pub use entities::SigningCase;
pub use entities::ValidationError;
pub use identifiers::ArtifactRef;
pub use identifiers::DocumentId;
pub use identifiers::EnvelopeId;
pub use identifiers::FieldId;
pub use identifiers::OrgId;
pub use identifiers::SignerId;
pub use status::DocumentStatus;
pub use status::EnvelopeStatus;
pub use status::SignatureKind;
pub use status::SignerStatus;
pub use time::Timestamp;
