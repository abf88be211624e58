// crates/countersign-config/src/settings.rs
// ============================================================================
// Module: Countersign Settings
// Description: TOML configuration model, load guards, and validation.
// Purpose: Give operators one checked entry point for engine and store tuning.
// Dependencies: countersign-core, countersign-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! This module loads and validates the Countersign configuration file. The
//! file is TOML with an `[engine]` section deserializing into
//! [`EngineConfig`] and a `[store]` section deserializing into
//! [`SqliteStoreConfig`]; both sections are optional and fall back to
//! defaults. Loading is strict and fail-closed: path limits, a file size
//! cap, and a UTF-8 requirement are checked before parsing, unknown root
//! and `[engine]` keys are rejected, and range validation runs on every
//! load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use countersign_core::EngineConfig;
use countersign_store_sqlite::SqliteStoreConfig;
use countersign_store_sqlite::SqliteStoreMode;
use countersign_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted config path length.
const MAX_CONFIG_PATH_LENGTH: usize = 4096;
/// Maximum accepted length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum accepted config file size in bytes.
const MAX_CONFIG_BYTES: u64 = 1_048_576;
/// Upper bound on the commit retry budget.
const MAX_COMMIT_RETRY_CAP: u32 = 32;
/// Upper bound on the commit retry backoff step, in milliseconds.
const MAX_RETRY_BACKOFF_MS: u64 = 60_000;
/// Upper bound on envelopes examined per sweep run.
const MAX_SWEEP_BATCH_LIMIT: usize = 10_000;
/// Upper bound on the store busy timeout, in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Default store path when no config file names one.
const DEFAULT_STORE_PATH: &str = "countersign.sqlite";
/// Default store busy timeout, matching the store crate's serde default.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Messages are operator-facing and never embed file contents.
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    /// Config file I/O error.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config value out of range or otherwise unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Root Countersign configuration.
///
/// # Invariants
/// - Defaults alone form a valid configuration.
/// - Unknown root-level and `[engine]` keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountersignConfig {
    /// Engine tuning knobs (retries, retention, sweep batching).
    pub engine: EngineConfig,
    /// Durable store settings.
    pub store: SqliteStoreConfig,
}

impl Default for CountersignConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            store: SqliteStoreConfig {
                path: PathBuf::from(DEFAULT_STORE_PATH),
                busy_timeout_ms: DEFAULT_STORE_BUSY_TIMEOUT_MS,
                journal_mode: SqliteStoreMode::default(),
                sync_mode: SqliteSyncMode::default(),
            },
        }
    }
}

impl CountersignConfig {
    /// Loads configuration from the given path, or defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path fails safety checks, the file
    /// cannot be read or parsed, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        validate_config_path(path)?;
        let metadata = std::fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let bytes = std::fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges across every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_commit_retries > MAX_COMMIT_RETRY_CAP {
            return Err(ConfigError::Invalid(format!(
                "engine max_commit_retries must not exceed {MAX_COMMIT_RETRY_CAP}"
            )));
        }
        if self.engine.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "engine retry_backoff_ms must not exceed {MAX_RETRY_BACKOFF_MS}"
            )));
        }
        if self.engine.retention_ms <= 0 {
            return Err(ConfigError::Invalid(
                "engine retention_ms must be greater than zero".to_string(),
            ));
        }
        if self.engine.sweep_batch_limit == 0 {
            return Err(ConfigError::Invalid(
                "engine sweep_batch_limit must be greater than zero".to_string(),
            ));
        }
        if self.engine.sweep_batch_limit > MAX_SWEEP_BATCH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "engine sweep_batch_limit must not exceed {MAX_SWEEP_BATCH_LIMIT}"
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store path must not be empty".to_string()));
        }
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store busy_timeout_ms must not exceed {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates config file paths for safety limits.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_CONFIG_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
