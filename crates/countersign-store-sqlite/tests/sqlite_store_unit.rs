// crates/countersign-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Case Store Unit Tests
// Description: Targeted tests for path safety, schema versioning, CAS
//              commits, candidate scans, audit ordering, and corruption
//              detection.
// ============================================================================

//! ## Overview
//! Unit-level tests for the `SQLite` case store:
//! - Path safety checks (length/component/directory rejection)
//! - Schema version validation
//! - Insert guards and compare-and-swap conflict detection
//! - Persistence across reopen
//! - Sweep candidate scans (status filter, inclusive boundary, ordering)
//! - Audit sequence assignment and per-document filtering
//! - Uniqueness constraints and corruption detection

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::path::Path;
use std::path::PathBuf;

use countersign_core::ArtifactRef;
use countersign_core::AuditAction;
use countersign_core::AuditActor;
use countersign_core::AuditEntry;
use countersign_core::CaseStore;
use countersign_core::CaseUpdate;
use countersign_core::Document;
use countersign_core::DocumentId;
use countersign_core::DocumentStatus;
use countersign_core::Envelope;
use countersign_core::EnvelopeId;
use countersign_core::EnvelopeStatus;
use countersign_core::OrgId;
use countersign_core::Signature;
use countersign_core::SignatureKind;
use countersign_core::Signer;
use countersign_core::SignerId;
use countersign_core::SignerStatus;
use countersign_core::SigningCase;
use countersign_core::StoreError;
use countersign_core::Timestamp;
use countersign_store_sqlite::SqliteCaseStore;
use countersign_store_sqlite::SqliteStoreConfig;
use countersign_store_sqlite::SqliteStoreError;
use countersign_store_sqlite::SqliteStoreMode;
use countersign_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn sample_document(document_id: &str) -> Document {
    Document {
        document_id: DocumentId::new(document_id),
        org_id: OrgId::new("org-1"),
        title: "Master Services Agreement".to_string(),
        file_ref: ArtifactRef::new("s3://documents/msa.pdf"),
        status: DocumentStatus::Draft,
        created_at: ts(100),
        updated_at: ts(100),
    }
}

fn sample_signer(envelope_id: &str) -> Signer {
    Signer {
        signer_id: SignerId::new(format!("{envelope_id}-s1")),
        envelope_id: EnvelopeId::new(envelope_id),
        name: "Dana Cortez".to_string(),
        email: "dana@example.com".to_string(),
        status: SignerStatus::Pending,
        fields: Vec::new(),
        signature: None,
        created_at: ts(100),
        updated_at: ts(100),
    }
}

fn sample_envelope(envelope_id: &str, document_id: &str) -> Envelope {
    Envelope {
        envelope_id: EnvelopeId::new(envelope_id),
        document_id: DocumentId::new(document_id),
        status: EnvelopeStatus::Pending,
        expires_at: None,
        signers: vec![sample_signer(envelope_id)],
        created_at: ts(100),
        updated_at: ts(100),
    }
}

fn audit_for(document_id: &str, envelope_id: Option<&str>, action: AuditAction) -> AuditEntry {
    AuditEntry {
        document_id: DocumentId::new(document_id),
        envelope_id: envelope_id.map(EnvelopeId::new),
        action,
        actor: AuditActor::User("ops-1".to_string()),
        recorded_at: ts(100),
        details: None,
    }
}

const fn config_for_path(path: PathBuf) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path,
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    }
}

fn store_for(path: &Path) -> SqliteCaseStore {
    SqliteCaseStore::new(config_for_path(path.to_path_buf())).expect("store init")
}

fn seeded(store: &SqliteCaseStore, document_id: &str, envelope_id: &str) -> SigningCase {
    store
        .insert_document(
            &sample_document(document_id),
            &audit_for(document_id, None, AuditAction::DocumentUploaded),
        )
        .expect("insert document");
    store
        .insert_case(
            &sample_envelope(envelope_id, document_id),
            &audit_for(document_id, Some(envelope_id), AuditAction::EnvelopeCreated),
        )
        .expect("insert case");
    store
        .load_case(&EnvelopeId::new(envelope_id))
        .expect("load case")
        .expect("case present")
}

fn seed_with_envelope(store: &SqliteCaseStore, envelope: &Envelope) {
    let document_id = envelope.document_id.as_str();
    let envelope_id = envelope.envelope_id.as_str();
    store
        .insert_document(
            &sample_document(document_id),
            &audit_for(document_id, None, AuditAction::DocumentUploaded),
        )
        .expect("insert document");
    store
        .insert_case(
            envelope,
            &audit_for(document_id, Some(envelope_id), AuditAction::EnvelopeCreated),
        )
        .expect("insert case");
}

fn sign_first_signer(case: &mut SigningCase, signed_at: i64) {
    let signer = &mut case.envelope.signers[0];
    signer.status = SignerStatus::Signed;
    signer.signature = Some(Signature {
        signer_id: signer.signer_id.clone(),
        artifact: ArtifactRef::new("s3://signatures/stroke.png"),
        method: SignatureKind::Draw,
        origin_addr: None,
        signed_at: ts(signed_at),
    });
    signer.updated_at = ts(signed_at);
    case.envelope.updated_at = ts(signed_at);
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let config = config_for_path(temp.path().to_path_buf());
    let Err(err) = SqliteCaseStore::new(config) else {
        panic!("expected directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_empty_path() {
    let config = config_for_path(PathBuf::new());
    let Err(err) = SqliteCaseStore::new(config) else {
        panic!("expected empty path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_overlong_component() {
    let temp = TempDir::new().unwrap();
    let long_name = "a".repeat(300);
    let path = temp.path().join(long_name);
    let config = config_for_path(path);
    let Err(err) = SqliteCaseStore::new(config) else {
        panic!("expected overlong component to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_overlong_total_path() {
    let temp = TempDir::new().unwrap();
    let long_name = "a".repeat(5000);
    let path = temp.path().join(long_name);
    let config = config_for_path(path);
    let Err(err) = SqliteCaseStore::new(config) else {
        panic!("expected overlong path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

// ============================================================================
// SECTION: Schema Versioning
// ============================================================================

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE store_meta (version INTEGER NOT NULL);").unwrap();
    conn.execute("INSERT INTO store_meta (version) VALUES (?1)", params![999_i64]).unwrap();

    let config = config_for_path(path);
    let Err(err) = SqliteCaseStore::new(config) else {
        panic!("expected schema mismatch to fail");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

// ============================================================================
// SECTION: Round-Trips and Persistence
// ============================================================================

#[test]
fn sqlite_store_round_trips_case() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let case = seeded(&store, "doc-1", "env-1");

    assert_eq!(case.version, 1);
    assert_eq!(case.envelope.envelope_id.as_str(), "env-1");
    assert_eq!(case.envelope.status, EnvelopeStatus::Pending);
    assert_eq!(case.document.document_id.as_str(), "doc-1");
    assert_eq!(case.document.title, "Master Services Agreement");

    let document =
        store.document(&DocumentId::new("doc-1")).expect("document query").expect("document");
    assert_eq!(document.org_id.as_str(), "org-1");
}

#[test]
fn sqlite_store_loads_case_by_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let case = store
        .case_by_document(&DocumentId::new("doc-1"))
        .expect("case query")
        .expect("case present");
    assert_eq!(case.envelope.envelope_id.as_str(), "env-1");
    assert_eq!(case.version, 1);
}

#[test]
fn sqlite_store_missing_rows_return_none() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);

    assert!(store.load_case(&EnvelopeId::new("env-missing")).expect("load").is_none());
    assert!(store.case_by_document(&DocumentId::new("doc-missing")).expect("load").is_none());
    assert!(store.document(&DocumentId::new("doc-missing")).expect("load").is_none());
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    {
        let store = store_for(&path);
        seeded(&store, "doc-1", "env-1");
    }

    let store = store_for(&path);
    let case = store
        .load_case(&EnvelopeId::new("env-1"))
        .expect("load after reopen")
        .expect("case survives reopen");
    assert_eq!(case.version, 1);
    assert_eq!(case.document.document_id.as_str(), "doc-1");

    let trail = store.audit_trail(&DocumentId::new("doc-1")).expect("audit trail");
    assert_eq!(trail.len(), 2);
}

#[test]
fn sqlite_store_readiness_succeeds() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    store.readiness().expect("readiness");
}

// ============================================================================
// SECTION: Insert Guards
// ============================================================================

#[test]
fn sqlite_store_rejects_duplicate_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let Err(err) = store.insert_document(
        &sample_document("doc-1"),
        &audit_for("doc-1", None, AuditAction::DocumentUploaded),
    ) else {
        panic!("expected duplicate document to fail");
    };
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn sqlite_store_requires_registered_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);

    let Err(err) = store.insert_case(
        &sample_envelope("env-1", "doc-unregistered"),
        &audit_for("doc-unregistered", Some("env-1"), AuditAction::EnvelopeCreated),
    ) else {
        panic!("expected unregistered document to fail");
    };
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn sqlite_store_rejects_second_envelope_for_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let Err(err) = store.insert_case(
        &sample_envelope("env-2", "doc-1"),
        &audit_for("doc-1", Some("env-2"), AuditAction::EnvelopeCreated),
    ) else {
        panic!("expected second envelope to fail");
    };
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn sqlite_store_rejects_duplicate_envelope_id() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");
    store
        .insert_document(
            &sample_document("doc-2"),
            &audit_for("doc-2", None, AuditAction::DocumentUploaded),
        )
        .expect("insert second document");

    let Err(err) = store.insert_case(
        &sample_envelope("env-1", "doc-2"),
        &audit_for("doc-2", Some("env-1"), AuditAction::EnvelopeCreated),
    ) else {
        panic!("expected duplicate envelope id to fail");
    };
    assert!(matches!(err, StoreError::Conflict(_)));
}

// ============================================================================
// SECTION: Compare-and-Swap Commits
// ============================================================================

#[test]
fn sqlite_store_commits_bump_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let mut case = seeded(&store, "doc-1", "env-1");

    case.envelope.status = EnvelopeStatus::InProgress;
    let commit = store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeSent)],
        ))
        .expect("first commit");
    assert_eq!(commit.version, 2);

    let mut case = store
        .load_case(&EnvelopeId::new("env-1"))
        .expect("reload")
        .expect("case present");
    assert_eq!(case.version, 2);
    case.envelope.status = EnvelopeStatus::Revoked;
    let commit = store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeRevoked)],
        ))
        .expect("second commit");
    assert_eq!(commit.version, 3);

    let case = store
        .load_case(&EnvelopeId::new("env-1"))
        .expect("final reload")
        .expect("case present");
    assert_eq!(case.version, 3);
    assert_eq!(case.envelope.status, EnvelopeStatus::Revoked);
}

#[test]
fn sqlite_store_rejects_stale_version_and_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let case = seeded(&store, "doc-1", "env-1");

    let mut first = case.clone();
    first.envelope.status = EnvelopeStatus::InProgress;
    store
        .commit_case(&CaseUpdate::new(
            first,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeSent)],
        ))
        .expect("first commit");

    let mut stale = case;
    stale.envelope.status = EnvelopeStatus::Revoked;
    let Err(err) = store.commit_case(&CaseUpdate::new(
        stale,
        vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeRevoked)],
    )) else {
        panic!("expected stale commit to fail");
    };
    assert!(matches!(err, StoreError::Conflict(_)));

    let current = store
        .load_case(&EnvelopeId::new("env-1"))
        .expect("reload")
        .expect("case present");
    assert_eq!(current.version, 2);
    assert_eq!(current.envelope.status, EnvelopeStatus::InProgress);

    let trail = store.audit_trail(&DocumentId::new("doc-1")).expect("audit trail");
    assert_eq!(trail.len(), 3, "failed commit should append no audit rows");
}

#[test]
fn sqlite_store_commit_requires_inserted_envelope() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);

    let case = SigningCase {
        document: sample_document("doc-ghost"),
        envelope: sample_envelope("env-ghost", "doc-ghost"),
        version: 1,
    };
    let Err(err) = store.commit_case(&CaseUpdate::new(case, Vec::new())) else {
        panic!("expected commit on missing envelope to fail");
    };
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn sqlite_store_commit_updates_document_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let mut case = seeded(&store, "doc-1", "env-1");

    case.document.status = DocumentStatus::Sent;
    case.envelope.status = EnvelopeStatus::InProgress;
    store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeSent)],
        ))
        .expect("commit");

    let document =
        store.document(&DocumentId::new("doc-1")).expect("document query").expect("document");
    assert_eq!(document.status, DocumentStatus::Sent);
}

// ============================================================================
// SECTION: Signature Uniqueness
// ============================================================================

#[test]
fn sqlite_store_enforces_one_signature_per_signer() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let mut case = seeded(&store, "doc-1", "env-1");

    sign_first_signer(&mut case, 2_000);
    case.envelope.status = EnvelopeStatus::InProgress;
    store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::DocumentSigned)],
        ))
        .expect("signing commit");

    let conn = Connection::open(&path).unwrap();
    let result = conn.execute(
        "INSERT INTO signatures (signer_id, envelope_id, signature_json) VALUES (?1, ?2, ?3)",
        params!["env-1-s1", "env-1", "{}"],
    );
    assert!(result.is_err(), "duplicate signature row should violate the primary key");
}

#[test]
fn sqlite_store_keeps_signature_row_across_recommits() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let mut case = seeded(&store, "doc-1", "env-1");

    sign_first_signer(&mut case, 2_000);
    case.envelope.status = EnvelopeStatus::Completed;
    store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeCompleted)],
        ))
        .expect("signing commit");

    let mut case = store
        .load_case(&EnvelopeId::new("env-1"))
        .expect("reload")
        .expect("case present");
    case.envelope.status = EnvelopeStatus::Archived;
    store
        .commit_case(&CaseUpdate::new(
            case,
            vec![audit_for("doc-1", Some("env-1"), AuditAction::DocumentArchived)],
        ))
        .expect("recommit with stored signature");

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM signatures WHERE signer_id = ?1",
            params!["env-1-s1"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

// ============================================================================
// SECTION: Sweep Candidate Scans
// ============================================================================

#[test]
fn sqlite_store_expired_candidates_filter_and_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);

    let mut env_a = sample_envelope("env-a", "doc-a");
    env_a.expires_at = Some(ts(1_000));
    seed_with_envelope(&store, &env_a);

    let mut env_b = sample_envelope("env-b", "doc-b");
    env_b.expires_at = Some(ts(2_000));
    seed_with_envelope(&store, &env_b);
    let mut case_b = store
        .load_case(&EnvelopeId::new("env-b"))
        .expect("load env-b")
        .expect("case present");
    case_b.envelope.status = EnvelopeStatus::InProgress;
    store
        .commit_case(&CaseUpdate::new(
            case_b,
            vec![audit_for("doc-b", Some("env-b"), AuditAction::EnvelopeSent)],
        ))
        .expect("advance env-b");

    let mut env_c = sample_envelope("env-c", "doc-c");
    env_c.status = EnvelopeStatus::Completed;
    env_c.expires_at = Some(ts(500));
    seed_with_envelope(&store, &env_c);

    seed_with_envelope(&store, &sample_envelope("env-d", "doc-d"));

    let due = store.expired_candidates(ts(1_500), 10).expect("scan at 1500");
    assert_eq!(due, vec![EnvelopeId::new("env-a")]);

    let due = store.expired_candidates(ts(2_000), 10).expect("scan at deadline");
    assert_eq!(due, vec![EnvelopeId::new("env-a"), EnvelopeId::new("env-b")]);

    let due = store.expired_candidates(ts(2_000), 1).expect("scan with limit");
    assert_eq!(due, vec![EnvelopeId::new("env-a")]);

    let due = store.expired_candidates(ts(999), 10).expect("scan before deadlines");
    assert!(due.is_empty());
}

#[test]
fn sqlite_store_archival_candidates_use_cutoff() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);

    let mut done = sample_envelope("env-x", "doc-x");
    done.status = EnvelopeStatus::Completed;
    done.updated_at = ts(1_000);
    seed_with_envelope(&store, &done);

    let mut open = sample_envelope("env-y", "doc-y");
    open.updated_at = ts(500);
    seed_with_envelope(&store, &open);

    let due = store.archival_candidates(ts(999), 10).expect("scan before cutoff");
    assert!(due.is_empty());

    let due = store.archival_candidates(ts(1_000), 10).expect("scan at cutoff");
    assert_eq!(due, vec![EnvelopeId::new("env-x")]);
}

// ============================================================================
// SECTION: Audit Trail
// ============================================================================

#[test]
fn sqlite_store_audit_seq_ascends_across_commits() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let mut case = seeded(&store, "doc-1", "env-1");

    case.envelope.status = EnvelopeStatus::InProgress;
    let commit = store
        .commit_case(&CaseUpdate::new(
            case,
            vec![
                audit_for("doc-1", Some("env-1"), AuditAction::EnvelopeSent),
                audit_for("doc-1", Some("env-1"), AuditAction::InvitationResent),
            ],
        ))
        .expect("commit with two audit rows");
    let commit_seqs: Vec<u64> = commit.audit.iter().map(|record| record.seq).collect();
    assert_eq!(commit_seqs, vec![3, 4]);

    let trail = store.audit_trail(&DocumentId::new("doc-1")).expect("audit trail");
    assert_eq!(trail.len(), 4);
    assert!(trail.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    let actions: Vec<AuditAction> = trail.iter().map(|record| record.entry.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::DocumentUploaded,
            AuditAction::EnvelopeCreated,
            AuditAction::EnvelopeSent,
            AuditAction::InvitationResent,
        ]
    );
}

#[test]
fn sqlite_store_audit_trail_filters_by_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");
    seeded(&store, "doc-2", "env-2");

    let trail = store.audit_trail(&DocumentId::new("doc-1")).expect("audit trail");
    assert_eq!(trail.len(), 2);
    assert!(trail.iter().all(|record| record.entry.document_id.as_str() == "doc-1"));

    let trail = store.audit_trail(&DocumentId::new("doc-2")).expect("audit trail");
    assert_eq!(trail.len(), 2);
    assert!(trail.iter().all(|record| record.entry.document_id.as_str() == "doc-2"));
}

// ============================================================================
// SECTION: Journal Mode and Corruption
// ============================================================================

#[test]
fn sqlite_store_applies_configured_journal_mode() {
    let temp = TempDir::new().unwrap();

    let wal_path = temp.path().join("wal.sqlite");
    let _wal_store = store_for(&wal_path);
    let conn = Connection::open(&wal_path).unwrap();
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    let delete_path = temp.path().join("delete.sqlite");
    let config = SqliteStoreConfig {
        path: delete_path.clone(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Delete,
        sync_mode: SqliteSyncMode::Normal,
    };
    let _delete_store = SqliteCaseStore::new(config).expect("store init");
    let conn = Connection::open(&delete_path).unwrap();
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
    assert_eq!(mode.to_lowercase(), "delete");
}

#[test]
fn sqlite_store_detects_corrupt_case_payload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE cases SET envelope_json = 'not-json' WHERE envelope_id = ?1",
        params!["env-1"],
    )
    .unwrap();

    let Err(err) = store.load_case(&EnvelopeId::new("env-1")) else {
        panic!("expected corrupt payload to fail");
    };
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn sqlite_store_detects_key_payload_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE cases SET envelope_id = 'env-other' WHERE envelope_id = ?1",
        params!["env-1"],
    )
    .unwrap();

    let Err(err) = store.load_case(&EnvelopeId::new("env-other")) else {
        panic!("expected key/payload mismatch to fail");
    };
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn sqlite_store_detects_missing_document_row() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    seeded(&store, "doc-1", "env-1");

    let conn = Connection::open(&path).unwrap();
    // The bundled SQLite build defaults foreign_keys to ON per connection;
    // disable it here so the corruption this test simulates can be injected.
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute("DELETE FROM documents WHERE document_id = ?1", params!["doc-1"]).unwrap();

    let Err(err) = store.load_case(&EnvelopeId::new("env-1")) else {
        panic!("expected missing document row to fail");
    };
    assert!(matches!(err, StoreError::Corrupt(_)));
}
