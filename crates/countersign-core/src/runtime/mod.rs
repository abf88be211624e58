// crates/countersign-core/src/runtime/mod.rs
// ============================================================================
// Module: Countersign Runtime
// Description: Lifecycle derivation, envelope engine, sweeps, and memory stores.
// Purpose: Wire the runtime modules and re-export their public surface.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime executes the lifecycle over the core model: the pure status
//! derivation, the [`EnvelopeEngine`] operations, the reconciliation sweeps,
//! and the in-memory reference stores used by tests and embedders.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod lifecycle;
pub mod memory;
pub mod sweeps;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::ActionReceipt;
pub use engine::CreateEnvelopeRequest;
pub use engine::DEFAULT_RETENTION_MS;
pub use engine::DocumentReceipt;
pub use engine::EngineConfig;
pub use engine::EngineError;
pub use engine::EnvelopeEngine;
pub use engine::EnvelopeEngineBuilder;
pub use engine::EnvelopeReceipt;
pub use engine::FieldReceipt;
pub use engine::PlaceFieldRequest;
pub use engine::RegisterDocumentRequest;
pub use engine::RemoveFieldRequest;
pub use engine::ResendInvitationRequest;
pub use engine::ResendReceipt;
pub use engine::RevokeEnvelopeRequest;
pub use engine::RevokeReceipt;
pub use engine::SendEnvelopeRequest;
pub use engine::SendReceipt;
pub use engine::SignerActionRequest;
pub use engine::SignerContact;
pub use engine::SignerOutcome;
pub use lifecycle::LifecycleOutcome;
pub use lifecycle::derive_envelope_status;
pub use lifecycle::document_status_for;
pub use lifecycle::signer_resolution_for;
pub use memory::InMemoryArchiveStore;
pub use memory::InMemoryCaseStore;
pub use sweeps::SweepFailure;
pub use sweeps::SweepReport;
