// crates/countersign-config/src/lib.rs
// ============================================================================
// Module: Countersign Config Library
// Description: TOML configuration model and validation for the workspace.
// Purpose: Load engine and store settings from one checked file.
// Dependencies: countersign-core, countersign-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! This crate provides [`CountersignConfig`], the root configuration struct
//! loaded from a TOML file with an `[engine]` section for
//! [`countersign_core::EngineConfig`] and a `[store]` section for
//! [`countersign_store_sqlite::SqliteStoreConfig`].
//! Invariants:
//! - Loading is fail-closed: path limits, a size cap, UTF-8, unknown-key
//!   rejection, and range validation all run before a config is returned.
//! - `CountersignConfig::default()` is always valid; a missing file section
//!   falls back to it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::settings::ConfigError;
pub use crate::settings::CountersignConfig;
