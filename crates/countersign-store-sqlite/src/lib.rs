// crates/countersign-store-sqlite/src/lib.rs
// ============================================================================
// Module: Countersign SQLite Store Library
// Description: Durable CaseStore backed by SQLite with compare-and-swap commits.
// Purpose: Persist signing cases and audit trails across process restarts.
// Dependencies: countersign-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteCaseStore`], a durable implementation of the
//! [`countersign_core::CaseStore`] seam. Cases persist as JSON snapshots with
//! extracted columns for the sweep scans, audit rows append in the same
//! transaction as the case write, and a schema version gate refuses databases
//! written by an incompatible release.
//! Invariants:
//! - A failed compare-and-swap commit writes nothing.
//! - Audit sequence numbers are store-assigned, ascending, and never reused.
//! - One envelope per document and one signature per signer are enforced by
//!   `UNIQUE` constraints, not just by engine checks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::store::SqliteCaseStore;
pub use crate::store::SqliteStoreConfig;
pub use crate::store::SqliteStoreError;
pub use crate::store::SqliteStoreMode;
pub use crate::store::SqliteSyncMode;
