// crates/countersign-core/src/runtime/memory.rs
// ============================================================================
// Module: Countersign Memory Stores
// Description: In-memory case store and archive store.
// Purpose: Provide reference store implementations for tests and embedders.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryCaseStore`] keeps the full consistency contract of
//! [`CaseStore`] — compare-and-swap commits, atomic audit appends,
//! store-assigned sequence numbers — behind a single mutex, so engine tests
//! exercise the same conflict paths the durable store produces.
//! [`InMemoryArchiveStore`] honors the idempotence contract of
//! [`ArchiveStore`] and counts physical moves for verification.
//! Invariants:
//! - Audit sequence numbers are assigned in commit order and never reused.
//! - A failed compare-and-swap writes nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ArtifactRef;
use crate::core::AuditEntry;
use crate::core::AuditRecord;
use crate::core::Document;
use crate::core::DocumentId;
use crate::core::Envelope;
use crate::core::EnvelopeId;
use crate::core::EnvelopeStatus;
use crate::core::SigningCase;
use crate::core::Timestamp;
use crate::interfaces::ArchiveError;
use crate::interfaces::ArchiveStore;
use crate::interfaces::CaseCommit;
use crate::interfaces::CaseStore;
use crate::interfaces::CaseUpdate;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Memory Case Store
// ============================================================================

/// Envelope record stored with its version token.
#[derive(Debug, Clone)]
struct StoredCase {
    /// Envelope record with signers embedded.
    envelope: Envelope,
    /// Compare-and-swap version token.
    version: u64,
}

/// Mutable state behind the store mutex.
#[derive(Debug, Default)]
struct MemoryInner {
    /// Documents by identifier.
    documents: BTreeMap<DocumentId, Document>,
    /// Cases by envelope identifier.
    cases: BTreeMap<EnvelopeId, StoredCase>,
    /// Envelope lookup by document, enforcing one envelope per document.
    document_envelopes: BTreeMap<DocumentId, EnvelopeId>,
    /// Append-only audit ledger in sequence order.
    audit: Vec<AuditRecord>,
    /// Last assigned audit sequence number.
    last_seq: u64,
}

impl MemoryInner {
    /// Appends one audit entry with the next sequence number.
    fn append_audit(&mut self, entry: &AuditEntry) -> AuditRecord {
        self.last_seq += 1;
        let record = AuditRecord {
            seq: self.last_seq,
            entry: entry.clone(),
        };
        self.audit.push(record.clone());
        record
    }

    /// Joins an envelope with its document into a full case.
    fn join_case(&self, stored: &StoredCase) -> Result<SigningCase, StoreError> {
        let document =
            self.documents.get(&stored.envelope.document_id).cloned().ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "document {} missing for envelope {}",
                    stored.envelope.document_id, stored.envelope.envelope_id
                ))
            })?;
        Ok(SigningCase {
            document,
            envelope: stored.envelope.clone(),
            version: stored.version,
        })
    }
}

/// In-memory case store with full compare-and-swap semantics.
#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    /// Store state behind one mutex.
    inner: Mutex<MemoryInner>,
}

impl InMemoryCaseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner.lock().map_err(|_poisoned| StoreError::Io("store mutex poisoned".to_string()))
    }
}

impl CaseStore for InMemoryCaseStore {
    fn insert_document(
        &self,
        document: &Document,
        audit: &AuditEntry,
    ) -> Result<AuditRecord, StoreError> {
        let mut inner = self.lock()?;
        if inner.documents.contains_key(&document.document_id) {
            return Err(StoreError::Conflict(format!(
                "document {} already exists",
                document.document_id
            )));
        }
        inner.documents.insert(document.document_id.clone(), document.clone());
        Ok(inner.append_audit(audit))
    }

    fn insert_case(
        &self,
        envelope: &Envelope,
        audit: &AuditEntry,
    ) -> Result<CaseCommit, StoreError> {
        let mut inner = self.lock()?;
        if !inner.documents.contains_key(&envelope.document_id) {
            return Err(StoreError::NotFound(format!(
                "document {} is not registered",
                envelope.document_id
            )));
        }
        if inner.document_envelopes.contains_key(&envelope.document_id) {
            return Err(StoreError::Conflict(format!(
                "document {} already has an envelope",
                envelope.document_id
            )));
        }
        if inner.cases.contains_key(&envelope.envelope_id) {
            return Err(StoreError::Conflict(format!(
                "envelope {} already exists",
                envelope.envelope_id
            )));
        }
        inner.cases.insert(
            envelope.envelope_id.clone(),
            StoredCase {
                envelope: envelope.clone(),
                version: 1,
            },
        );
        inner.document_envelopes.insert(envelope.document_id.clone(), envelope.envelope_id.clone());
        let record = inner.append_audit(audit);
        Ok(CaseCommit {
            version: 1,
            audit: vec![record],
        })
    }

    fn document(&self, document_id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.documents.get(document_id).cloned())
    }

    fn load_case(&self, envelope_id: &EnvelopeId) -> Result<Option<SigningCase>, StoreError> {
        let inner = self.lock()?;
        inner.cases.get(envelope_id).map(|stored| inner.join_case(stored)).transpose()
    }

    fn case_by_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<SigningCase>, StoreError> {
        let inner = self.lock()?;
        inner
            .document_envelopes
            .get(document_id)
            .and_then(|envelope_id| inner.cases.get(envelope_id))
            .map(|stored| inner.join_case(stored))
            .transpose()
    }

    fn commit_case(&self, update: &CaseUpdate) -> Result<CaseCommit, StoreError> {
        let mut inner = self.lock()?;
        let envelope_id = update.case.envelope.envelope_id.clone();
        let stored_version = match inner.cases.get(&envelope_id) {
            Some(stored) => stored.version,
            None => {
                return Err(StoreError::NotFound(format!(
                    "envelope {envelope_id} was never inserted"
                )));
            }
        };
        if stored_version != update.expected_version {
            return Err(StoreError::Conflict(format!(
                "envelope {envelope_id} is at version {stored_version}, expected {}",
                update.expected_version
            )));
        }
        let next_version = stored_version + 1;
        inner.cases.insert(
            envelope_id,
            StoredCase {
                envelope: update.case.envelope.clone(),
                version: next_version,
            },
        );
        inner
            .documents
            .insert(update.case.document.document_id.clone(), update.case.document.clone());
        let audit = update.audit.iter().map(|entry| inner.append_audit(entry)).collect();
        Ok(CaseCommit {
            version: next_version,
            audit,
        })
    }

    fn expired_candidates(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .cases
            .values()
            .filter(|stored| {
                matches!(
                    stored.envelope.status,
                    EnvelopeStatus::Pending | EnvelopeStatus::InProgress
                ) && stored.envelope.expires_at.is_some_and(|deadline| deadline <= now)
            })
            .take(limit)
            .map(|stored| stored.envelope.envelope_id.clone())
            .collect())
    }

    fn archival_candidates(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<EnvelopeId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .cases
            .values()
            .filter(|stored| {
                stored.envelope.status == EnvelopeStatus::Completed
                    && stored.envelope.updated_at <= cutoff
            })
            .take(limit)
            .map(|stored| stored.envelope.envelope_id.clone())
            .collect())
    }

    fn audit_trail(&self, document_id: &DocumentId) -> Result<Vec<AuditRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .audit
            .iter()
            .filter(|record| &record.entry.document_id == document_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Memory Archive Store
// ============================================================================

/// Mutable state behind the archive mutex.
#[derive(Debug, Default)]
struct ArchiveInner {
    /// Completed moves, original reference to archived reference.
    moved: BTreeMap<String, String>,
    /// Count of physical moves performed.
    moves: u64,
}

/// In-memory archive store that prefixes references with `archive/` and
/// never moves the same artifact twice.
#[derive(Debug, Default)]
pub struct InMemoryArchiveStore {
    /// Archive state behind one mutex.
    inner: Mutex<ArchiveInner>,
}

impl InMemoryArchiveStore {
    /// Creates an empty archive store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many physical moves have been performed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Archive`] when the archive lock is poisoned.
    pub fn move_count(&self) -> Result<u64, ArchiveError> {
        Ok(self.lock()?.moves)
    }

    /// Locks the archive state.
    fn lock(&self) -> Result<MutexGuard<'_, ArchiveInner>, ArchiveError> {
        self.inner
            .lock()
            .map_err(|_poisoned| ArchiveError::Archive("archive mutex poisoned".to_string()))
    }
}

impl ArchiveStore for InMemoryArchiveStore {
    fn archive_artifact(&self, artifact: &ArtifactRef) -> Result<ArtifactRef, ArchiveError> {
        let mut inner = self.lock()?;
        let original = artifact.as_str().to_string();
        if let Some(archived) = inner.moved.get(&original) {
            return Ok(ArtifactRef::new(archived.clone()));
        }
        if inner.moved.values().any(|archived| archived == &original) {
            // Already an archived location; report it unchanged.
            return Ok(artifact.clone());
        }
        let archived = format!("archive/{original}");
        inner.moved.insert(original, archived.clone());
        inner.moves += 1;
        Ok(ArtifactRef::new(archived))
    }
}
