// crates/countersign-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Case Store
// Description: Durable CaseStore backed by SQLite WAL.
// Purpose: Persist signing cases and audit rows with compare-and-swap commits.
// Dependencies: countersign-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`CaseStore`] using `SQLite`. A case is
//! stored as a JSON snapshot keyed by envelope, alongside extracted status,
//! deadline, and recency columns that serve the sweep scans without
//! deserializing every row. The version column carries the optimistic
//! compare-and-swap token: a commit re-reads it inside the write transaction
//! and fails with a conflict when it moved, writing nothing. Audit rows land
//! in the same transaction as the case write and take their sequence numbers
//! from the store. Loads verify key/payload agreement and fail closed on
//! rows that do not parse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use countersign_core::AuditEntry;
use countersign_core::AuditRecord;
use countersign_core::CaseCommit;
use countersign_core::CaseStore;
use countersign_core::CaseUpdate;
use countersign_core::Document;
use countersign_core::DocumentId;
use countersign_core::Envelope;
use countersign_core::EnvelopeId;
use countersign_core::Signature;
use countersign_core::SigningCase;
use countersign_core::StoreError;
use countersign_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` case store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw case or audit payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store lock contention exceeding the busy timeout.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Referenced entity is absent where the operation requires it.
    #[error("sqlite store entity not found: {0}")]
    NotFound(String),
    /// Compare-and-swap mismatch or uniqueness violation.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Store corruption or key/payload mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Busy(message) => Self::Busy(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed case store with WAL support.
///
/// # Invariants
/// - Connection access is serialized through a mutex; every mutating
///   operation runs in one transaction.
/// - A failed compare-and-swap writes nothing.
#[derive(Clone)]
pub struct SqliteCaseStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCaseStore {
    /// Opens an `SQLite`-backed case store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the store connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_poisoned| SqliteStoreError::Io("sqlite store mutex poisoned".to_string()))
    }

    /// Verifies the store can execute a simple query.
    fn check_connection(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(map_db_error)?;
        Ok(())
    }

    /// Inserts a draft document together with its registration audit row.
    fn insert_document_record(
        &self,
        document: &Document,
        audit: &AuditEntry,
    ) -> Result<AuditRecord, SqliteStoreError> {
        let document_json = serde_json::to_string(document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(map_db_error)?;
        let result = {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO documents (document_id, document_json) VALUES (?1, ?2)",
                )
                .map_err(map_db_error)?;
            stmt.execute(params![document.document_id.as_str(), document_json])
        };
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(SqliteStoreError::Conflict(format!(
                    "document {} already exists",
                    document.document_id
                )));
            }
            Err(err) => return Err(map_db_error(err)),
        }
        let record = append_audit(&tx, audit)?;
        tx.commit().map_err(map_db_error)?;
        drop(guard);
        Ok(record)
    }

    /// Inserts a new signing case at version 1 with its creation audit row.
    fn insert_case_record(
        &self,
        envelope: &Envelope,
        audit: &AuditEntry,
    ) -> Result<CaseCommit, SqliteStoreError> {
        let envelope_json = serde_json::to_string(envelope)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(map_db_error)?;
        let document_known: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM documents WHERE document_id = ?1",
                params![envelope.document_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        if document_known.is_none() {
            return Err(SqliteStoreError::NotFound(format!(
                "document {} is not registered",
                envelope.document_id
            )));
        }
        let enveloped: Option<String> = tx
            .query_row(
                "SELECT envelope_id FROM cases WHERE document_id = ?1",
                params![envelope.document_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        if enveloped.is_some() {
            return Err(SqliteStoreError::Conflict(format!(
                "document {} already has an envelope",
                envelope.document_id
            )));
        }
        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM cases WHERE envelope_id = ?1",
                params![envelope.envelope_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        if taken.is_some() {
            return Err(SqliteStoreError::Conflict(format!(
                "envelope {} already exists",
                envelope.envelope_id
            )));
        }
        write_case_row(&tx, envelope, &envelope_json, 1, true)?;
        let record = append_audit(&tx, audit)?;
        tx.commit().map_err(map_db_error)?;
        drop(guard);
        Ok(CaseCommit {
            version: 1,
            audit: vec![record],
        })
    }

    /// Commits a case update while the stored version still matches.
    fn commit_case_update(&self, update: &CaseUpdate) -> Result<CaseCommit, SqliteStoreError> {
        let envelope = &update.case.envelope;
        let envelope_json = serde_json::to_string(envelope)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let document_json = serde_json::to_string(&update.case.document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(map_db_error)?;
        let stored_version: Option<i64> = tx
            .query_row(
                "SELECT version FROM cases WHERE envelope_id = ?1",
                params![envelope.envelope_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        let Some(stored_version) = stored_version else {
            return Err(SqliteStoreError::NotFound(format!(
                "envelope {} was never inserted",
                envelope.envelope_id
            )));
        };
        let stored_version = u64::try_from(stored_version).map_err(|_| {
            SqliteStoreError::Corrupt(format!(
                "invalid version for envelope {}",
                envelope.envelope_id
            ))
        })?;
        if stored_version != update.expected_version {
            return Err(SqliteStoreError::Conflict(format!(
                "envelope {} is at version {stored_version}, expected {}",
                envelope.envelope_id, update.expected_version
            )));
        }
        let next_version = stored_version + 1;
        write_case_row(&tx, envelope, &envelope_json, next_version, false)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO documents (document_id, document_json) VALUES (?1, ?2) ON \
                     CONFLICT(document_id) DO UPDATE SET document_json = excluded.document_json",
                )
                .map_err(map_db_error)?;
            stmt.execute(params![
                update.case.document.document_id.as_str(),
                document_json
            ])
            .map_err(map_db_error)?;
        }
        for signer in &envelope.signers {
            if let Some(signature) = &signer.signature {
                persist_signature(&tx, &envelope.envelope_id, signature)?;
            }
        }
        let audit = update
            .audit
            .iter()
            .map(|entry| append_audit(&tx, entry))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit().map_err(map_db_error)?;
        drop(guard);
        Ok(CaseCommit {
            version: next_version,
            audit,
        })
    }

    /// Loads a document by identifier.
    fn fetch_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<Document>, SqliteStoreError> {
        let guard = self.lock()?;
        let document_json: Option<String> = guard
            .query_row(
                "SELECT document_json FROM documents WHERE document_id = ?1",
                params![document_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        drop(guard);
        let Some(document_json) = document_json else {
            return Ok(None);
        };
        let document = parse_document(document_id, &document_json)?;
        Ok(Some(document))
    }

    /// Loads the full case (document + envelope + version) by envelope.
    fn fetch_case(
        &self,
        envelope_id: &EnvelopeId,
    ) -> Result<Option<SigningCase>, SqliteStoreError> {
        let guard = self.lock()?;
        let row: Option<(String, i64, String)> = guard
            .query_row(
                "SELECT document_id, version, envelope_json FROM cases WHERE envelope_id = ?1",
                params![envelope_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(map_db_error)?;
        let Some((document_id, version, envelope_json)) = row else {
            return Ok(None);
        };
        let document_json: Option<String> = guard
            .query_row(
                "SELECT document_json FROM documents WHERE document_id = ?1",
                params![document_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_error)?;
        drop(guard);
        let Some(document_json) = document_json else {
            return Err(SqliteStoreError::Corrupt(format!(
                "document {document_id} missing for envelope {envelope_id}"
            )));
        };
        let case = build_case(envelope_id, &envelope_json, &document_json, version)?;
        Ok(Some(case))
    }

    /// Loads the full case by document.
    fn fetch_case_by_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<SigningCase>, SqliteStoreError> {
        let envelope_id: Option<String> = {
            let guard = self.lock()?;
            guard
                .query_row(
                    "SELECT envelope_id FROM cases WHERE document_id = ?1",
                    params![document_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_db_error)?
        };
        match envelope_id {
            Some(envelope_id) => self.fetch_case(&EnvelopeId::new(envelope_id)),
            None => Ok(None),
        }
    }

    /// Scans for envelopes due for the expiration sweep.
    fn scan_expired(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, SqliteStoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| SqliteStoreError::Invalid("limit too large".to_string()))?;
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT envelope_id FROM cases WHERE status IN ('pending', 'in_progress') AND \
                 expires_at IS NOT NULL AND expires_at <= ?1 ORDER BY envelope_id LIMIT ?2",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![now.as_unix_millis(), limit], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_db_error)?;
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(EnvelopeId::new(row.map_err(map_db_error)?));
        }
        Ok(candidates)
    }

    /// Scans for envelopes due for the archival sweep.
    fn scan_archival(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, SqliteStoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| SqliteStoreError::Invalid("limit too large".to_string()))?;
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT envelope_id FROM cases WHERE status = 'completed' AND updated_at <= ?1 \
                 ORDER BY envelope_id LIMIT ?2",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![cutoff.as_unix_millis(), limit], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_db_error)?;
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(EnvelopeId::new(row.map_err(map_db_error)?));
        }
        Ok(candidates)
    }

    /// Returns the audit trail for a document in ascending sequence order.
    fn fetch_audit_trail(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<AuditRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT seq, entry_json FROM audit_log WHERE document_id = ?1 ORDER BY seq ASC",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![document_id.as_str()], |row| {
                let seq: i64 = row.get(0)?;
                let entry_json: String = row.get(1)?;
                Ok((seq, entry_json))
            })
            .map_err(map_db_error)?;
        let mut records = Vec::new();
        for row in rows {
            let (seq, entry_json) = row.map_err(map_db_error)?;
            let seq = u64::try_from(seq).map_err(|_| {
                SqliteStoreError::Corrupt(format!("invalid audit sequence: {seq}"))
            })?;
            let entry: AuditEntry = serde_json::from_str(&entry_json)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            records.push(AuditRecord {
                seq,
                entry,
            });
        }
        Ok(records)
    }
}

impl CaseStore for SqliteCaseStore {
    fn insert_document(
        &self,
        document: &Document,
        audit: &AuditEntry,
    ) -> Result<AuditRecord, StoreError> {
        self.insert_document_record(document, audit).map_err(StoreError::from)
    }

    fn insert_case(
        &self,
        envelope: &Envelope,
        audit: &AuditEntry,
    ) -> Result<CaseCommit, StoreError> {
        self.insert_case_record(envelope, audit).map_err(StoreError::from)
    }

    fn document(&self, document_id: &DocumentId) -> Result<Option<Document>, StoreError> {
        self.fetch_document(document_id).map_err(StoreError::from)
    }

    fn load_case(&self, envelope_id: &EnvelopeId) -> Result<Option<SigningCase>, StoreError> {
        self.fetch_case(envelope_id).map_err(StoreError::from)
    }

    fn case_by_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<SigningCase>, StoreError> {
        self.fetch_case_by_document(document_id).map_err(StoreError::from)
    }

    fn commit_case(&self, update: &CaseUpdate) -> Result<CaseCommit, StoreError> {
        self.commit_case_update(update).map_err(StoreError::from)
    }

    fn expired_candidates(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError> {
        self.scan_expired(now, limit).map_err(StoreError::from)
    }

    fn archival_candidates(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError> {
        self.scan_archival(cutoff, limit).map_err(StoreError::from)
    }

    fn audit_trail(&self, document_id: &DocumentId) -> Result<Vec<AuditRecord>, StoreError> {
        self.fetch_audit_trail(document_id).map_err(StoreError::from)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.check_connection().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(map_db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(map_db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(map_db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(map_db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    document_id TEXT NOT NULL PRIMARY KEY,
                    document_json TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS cases (
                    envelope_id TEXT NOT NULL PRIMARY KEY,
                    document_id TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    expires_at INTEGER,
                    updated_at INTEGER NOT NULL,
                    version INTEGER NOT NULL,
                    envelope_json TEXT NOT NULL,
                    FOREIGN KEY (document_id) REFERENCES documents(document_id)
                );
                CREATE INDEX IF NOT EXISTS idx_cases_expiry
                    ON cases (status, expires_at);
                CREATE INDEX IF NOT EXISTS idx_cases_archival
                    ON cases (status, updated_at);
                CREATE TABLE IF NOT EXISTS signatures (
                    signer_id TEXT NOT NULL PRIMARY KEY,
                    envelope_id TEXT NOT NULL,
                    signature_json TEXT NOT NULL,
                    FOREIGN KEY (envelope_id) REFERENCES cases(envelope_id)
                );
                CREATE TABLE IF NOT EXISTS audit_log (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    document_id TEXT NOT NULL,
                    envelope_id TEXT,
                    entry_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_audit_document
                    ON audit_log (document_id);",
            )
            .map_err(map_db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(map_db_error)?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(map_db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(map_db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(map_db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(map_db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(map_db_error)?;
    Ok(())
}

/// Maps `SQLite` errors, classifying lock contention as retryable.
fn map_db_error(err: rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err
        && matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    {
        return SqliteStoreError::Busy(err.to_string());
    }
    SqliteStoreError::Db(err.to_string())
}

/// Writes or replaces the case row carrying the snapshot and scan columns.
fn write_case_row(
    tx: &Transaction<'_>,
    envelope: &Envelope,
    envelope_json: &str,
    version: u64,
    insert: bool,
) -> Result<(), SqliteStoreError> {
    let version = i64::try_from(version).map_err(|_| {
        SqliteStoreError::Invalid(format!(
            "version out of range for envelope {}",
            envelope.envelope_id
        ))
    })?;
    let expires_at = envelope.expires_at.map(Timestamp::as_unix_millis);
    if insert {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO cases (envelope_id, document_id, status, expires_at, updated_at, \
                 version, envelope_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(map_db_error)?;
        stmt.execute(params![
            envelope.envelope_id.as_str(),
            envelope.document_id.as_str(),
            envelope.status.as_str(),
            expires_at,
            envelope.updated_at.as_unix_millis(),
            version,
            envelope_json
        ])
        .map_err(map_db_error)?;
    } else {
        let mut stmt = tx
            .prepare_cached(
                "UPDATE cases SET status = ?2, expires_at = ?3, updated_at = ?4, version = ?5, \
                 envelope_json = ?6 WHERE envelope_id = ?1",
            )
            .map_err(map_db_error)?;
        stmt.execute(params![
            envelope.envelope_id.as_str(),
            envelope.status.as_str(),
            expires_at,
            envelope.updated_at.as_unix_millis(),
            version,
            envelope_json
        ])
        .map_err(map_db_error)?;
    }
    Ok(())
}

/// Persists a signer's signature row unless it is already stored.
///
/// The primary key on `signer_id` is the durable backstop for the
/// one-signature-per-signer rule; re-commits of a case whose signer already
/// signed leave the stored row untouched.
fn persist_signature(
    tx: &Transaction<'_>,
    envelope_id: &EnvelopeId,
    signature: &Signature,
) -> Result<(), SqliteStoreError> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM signatures WHERE signer_id = ?1",
            params![signature.signer_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_db_error)?;
    if existing.is_some() {
        return Ok(());
    }
    let signature_json = serde_json::to_string(signature)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let result = {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO signatures (signer_id, envelope_id, signature_json) VALUES (?1, ?2, \
                 ?3)",
            )
            .map_err(map_db_error)?;
        stmt.execute(params![
            signature.signer_id.as_str(),
            envelope_id.as_str(),
            signature_json
        ])
    };
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(SqliteStoreError::Conflict(format!(
                "signer {} already has a signature",
                signature.signer_id
            )))
        }
        Err(err) => Err(map_db_error(err)),
    }
}

/// Appends one audit row and returns it with the store-assigned sequence.
fn append_audit(tx: &Transaction<'_>, entry: &AuditEntry) -> Result<AuditRecord, SqliteStoreError> {
    let entry_json =
        serde_json::to_string(entry).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO audit_log (document_id, envelope_id, entry_json) VALUES (?1, ?2, ?3)",
            )
            .map_err(map_db_error)?;
        stmt.execute(params![
            entry.document_id.as_str(),
            entry.envelope_id.as_ref().map(EnvelopeId::as_str),
            entry_json
        ])
        .map_err(map_db_error)?;
    }
    let seq = tx.last_insert_rowid();
    let seq = u64::try_from(seq)
        .map_err(|_| SqliteStoreError::Corrupt(format!("invalid audit sequence: {seq}")))?;
    Ok(AuditRecord {
        seq,
        entry: entry.clone(),
    })
}

/// Parses a stored document payload, verifying key/payload agreement.
fn parse_document(
    document_id: &DocumentId,
    document_json: &str,
) -> Result<Document, SqliteStoreError> {
    let document: Document = serde_json::from_str(document_json)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if &document.document_id != document_id {
        return Err(SqliteStoreError::Invalid(
            "document id mismatch between key and payload".to_string(),
        ));
    }
    Ok(document)
}

/// Builds a validated case from stored row data.
fn build_case(
    envelope_id: &EnvelopeId,
    envelope_json: &str,
    document_json: &str,
    version: i64,
) -> Result<SigningCase, SqliteStoreError> {
    let envelope: Envelope = serde_json::from_str(envelope_json)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if &envelope.envelope_id != envelope_id {
        return Err(SqliteStoreError::Invalid(
            "envelope id mismatch between key and payload".to_string(),
        ));
    }
    let document = parse_document(&envelope.document_id, document_json)?;
    let version = u64::try_from(version).map_err(|_| {
        SqliteStoreError::Corrupt(format!("invalid version for envelope {envelope_id}"))
    })?;
    Ok(SigningCase {
        document,
        envelope,
        version,
    })
}
