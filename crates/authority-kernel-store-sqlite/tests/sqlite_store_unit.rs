// crates/authority-kernel-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Kernel Store Tests
// Description: Durable invariant enforcement, idempotent seal, and CAS.
// ============================================================================
//! ## Overview
//! Exercises the durable backend against the same contracts the in-memory
//! reference enforces, plus SQLite-specific guarantees: conflict-driven
//! idempotent seal, append-only triggers that reject raw SQL mutation, the
//! compare-and-set replay completion, and the dry-run-by-default purge job.

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

use std::sync::Arc;

use authority_kernel_core::AuditActor;
use authority_kernel_core::AuditFilter;
use authority_kernel_core::AuditLog;
use authority_kernel_core::AuthorityError;
use authority_kernel_core::AuthorityStore;
use authority_kernel_core::CANONICAL_ENVELOPE_VERSION;
use authority_kernel_core::Enterprise;
use authority_kernel_core::EnterpriseId;
use authority_kernel_core::EnterpriseStatus;
use authority_kernel_core::EnterpriseType;
use authority_kernel_core::Envelope;
use authority_kernel_core::EnvelopeBody;
use authority_kernel_core::EnvelopeLocator;
use authority_kernel_core::EnvelopeStatus;
use authority_kernel_core::EnvelopeStore;
use authority_kernel_core::ExecutionIdentity;
use authority_kernel_core::GateSource;
use authority_kernel_core::IdentityId;
use authority_kernel_core::IdentityMode;
use authority_kernel_core::IdentityRole;
use authority_kernel_core::IdentityStatus;
use authority_kernel_core::ManualClock;
use authority_kernel_core::PersonaId;
use authority_kernel_core::PersonaScope;
use authority_kernel_core::PolicyId;
use authority_kernel_core::ReplayAttempt;
use authority_kernel_core::ReplayCompletion;
use authority_kernel_core::ReplayId;
use authority_kernel_core::ReplayStatus;
use authority_kernel_core::ReplayStore;
use authority_kernel_core::ReplayStoreError;
use authority_kernel_core::SubVerticalId;
use authority_kernel_core::Timestamp;
use authority_kernel_core::VerifyStatus;
use authority_kernel_core::Workspace;
use authority_kernel_core::WorkspaceId;
use authority_kernel_core::WorkspaceStatus;
use authority_kernel_governance::BusinessEvent;
use authority_kernel_governance::GovernanceStore;
use authority_kernel_store_sqlite::PurgeConfig;
use authority_kernel_store_sqlite::SqliteKernelStore;
use authority_kernel_store_sqlite::SqliteStoreConfig;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn open_store(dir: &TempDir, clock: Arc<ManualClock>) -> SqliteKernelStore {
    let config = SqliteStoreConfig::for_path(dir.path().join("kernel.db"));
    SqliteKernelStore::open_with_clock(&config, clock).expect("open store")
}

fn raw_connection(dir: &TempDir) -> Connection {
    Connection::open(dir.path().join("kernel.db")).expect("raw connection")
}

fn now() -> Timestamp {
    Timestamp::from_unix_micros(1_000_000)
}

fn enterprise(raw_id: u128) -> Enterprise {
    Enterprise {
        enterprise_id: EnterpriseId::new(Uuid::from_u128(raw_id)),
        name: "E1".to_string(),
        enterprise_type: EnterpriseType::Real,
        region: "UAE".to_string(),
        status: EnterpriseStatus::Active,
        created_at: now(),
    }
}

fn workspace(raw_id: u128, enterprise_id: EnterpriseId) -> Workspace {
    Workspace {
        workspace_id: WorkspaceId::new(Uuid::from_u128(raw_id)),
        enterprise_id,
        sub_vertical_id: SubVerticalId::new("SV1"),
        name: "W1".to_string(),
        status: WorkspaceStatus::Active,
        created_at: now(),
        deleted_at: None,
    }
}

fn identity(
    raw_id: u128,
    enterprise_id: EnterpriseId,
    workspace_id: WorkspaceId,
) -> ExecutionIdentity {
    ExecutionIdentity {
        user_id: IdentityId::new(Uuid::from_u128(raw_id)),
        enterprise_id,
        workspace_id,
        sub_vertical_id: SubVerticalId::new("SV1"),
        role: IdentityRole::User,
        mode: IdentityMode::Real,
        status: IdentityStatus::Active,
        created_at: now(),
    }
}

fn envelope(raw_id: u128, expires_at: Option<Timestamp>) -> Envelope {
    let body = EnvelopeBody {
        envelope_version: CANONICAL_ENVELOPE_VERSION.to_string(),
        tenant_id: EnterpriseId::new(Uuid::from_u128(1)),
        workspace_id: WorkspaceId::new(Uuid::from_u128(10)),
        user_id: None,
        persona_id: PersonaId::new(Uuid::from_u128(50)),
        policy_id: PolicyId::new(Uuid::from_u128(51)),
        policy_version: 1,
        territory_id: None,
        persona_resolution_path: "GLOBAL".to_string(),
        persona_resolution_scope: PersonaScope::Global,
        territory_resolution_path: "none".to_string(),
        content: json!({"seed": 1}),
        sealed_at: now(),
        sealed_by: "api".to_string(),
        expires_at,
    };
    let sha256_hash = body.compute_hash().expect("hash");
    Envelope {
        envelope_id: authority_kernel_core::EnvelopeId::new(Uuid::from_u128(raw_id)),
        sha256_hash,
        body,
        status: EnvelopeStatus::Sealed,
        revoked_at: None,
        revoked_by: None,
        expired_at: None,
    }
}

// ============================================================================
// SECTION: Authority Invariants
// ============================================================================

#[test]
fn cross_enterprise_identity_is_rejected_and_audited() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));
    let actor = AuditActor::system();

    let e1 = enterprise(1);
    store.create_enterprise(e1.clone(), &actor).expect("create enterprise");
    let w1 = workspace(10, e1.enterprise_id);
    store.create_workspace(w1.clone(), &actor).expect("create workspace");

    let foreign = EnterpriseId::new(Uuid::from_u128(99));
    let err = store
        .create_identity(identity(20, foreign, w1.workspace_id), &actor)
        .unwrap_err();
    assert!(matches!(err, AuthorityError::CrossEnterpriseForbidden(_)));
    assert!(store.identity(IdentityId::new(Uuid::from_u128(20))).expect("read").is_none());

    let entries = store
        .entries(&AuditFilter {
            target: Some((
                "execution_identity".to_string(),
                IdentityId::new(Uuid::from_u128(20)).to_string(),
            )),
            ..AuditFilter::default()
        })
        .expect("audit entries");
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success, "the rejection itself is audited");
}

#[test]
fn role_escalation_is_rejected_at_the_store_boundary() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));
    let actor = AuditActor::system();

    let e1 = enterprise(1);
    store.create_enterprise(e1.clone(), &actor).expect("create enterprise");
    let w1 = workspace(10, e1.enterprise_id);
    store.create_workspace(w1.clone(), &actor).expect("create workspace");
    let subject = identity(20, e1.enterprise_id, w1.workspace_id);
    store.create_identity(subject.clone(), &actor).expect("create identity");

    let err = store
        .change_identity_role(subject.user_id, IdentityRole::SuperAdmin, &actor)
        .unwrap_err();
    assert!(matches!(err, AuthorityError::RoleEscalationForbidden { .. }));
    store
        .change_identity_role(subject.user_id, IdentityRole::EnterpriseAdmin, &actor)
        .expect("one-step promotion is allowed");
}

// ============================================================================
// SECTION: Idempotent Seal
// ============================================================================

#[test]
fn conflicting_seal_returns_the_existing_envelope() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));

    let first = store.seal(envelope(100, None)).expect("first seal");
    // A different envelope id with byte-identical content must converge on
    // the stored row.
    let second = store.seal(envelope(101, None)).expect("second seal");

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.envelope_id, second.envelope_id);
    assert_eq!(first.sha256_hash, second.sha256_hash);

    let verify = store
        .verify(&EnvelopeLocator::by_hash(first.sha256_hash.clone()), now())
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Valid);
}

#[test]
fn mismatched_hash_is_rejected_at_seal_time() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));

    let mut tampered = envelope(100, None);
    tampered.sha256_hash = authority_kernel_core::hash_bytes(b"not the body");
    assert!(store.seal(tampered).is_err());
}

#[test]
fn expiry_sweeper_transitions_sealed_rows() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));

    let expires = now().saturating_add_seconds(60);
    let sealed = store.seal(envelope(100, Some(expires))).expect("seal");
    assert_eq!(store.sweep_expired(now()).expect("early sweep"), 0);
    let later = now().saturating_add_seconds(120);
    assert_eq!(store.sweep_expired(later).expect("sweep"), 1);

    let verify = store
        .verify(&EnvelopeLocator::by_id(sealed.envelope_id), later)
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Expired);
}

// ============================================================================
// SECTION: Replay Compare-and-Set
// ============================================================================

#[test]
fn replay_completion_happens_exactly_once() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));

    let sealed = store.seal(envelope(100, None)).expect("seal");
    let attempt = ReplayAttempt {
        replay_id: ReplayId::new(Uuid::from_u128(500)),
        envelope_id: Some(sealed.envelope_id),
        envelope_hash: sealed.sha256_hash.clone(),
        replay_status: ReplayStatus::Pending,
        drift_details: None,
        failure_reason: None,
        context: json!({"seed": 1}),
        requested_by: "auditor".to_string(),
        source: GateSource::Internal,
        started_at: now(),
        ended_at: None,
    };
    store.insert(attempt.clone()).expect("insert attempt");

    let completion = ReplayCompletion {
        replay_status: ReplayStatus::Success,
        drift_details: None,
        failure_reason: None,
        ended_at: now().saturating_add_seconds(1),
    };
    let completed = store.complete(attempt.replay_id, completion.clone()).expect("complete");
    assert_eq!(completed.replay_status, ReplayStatus::Success);

    let err = store.complete(attempt.replay_id, completion).unwrap_err();
    assert!(matches!(err, ReplayStoreError::AlreadyCompleted));

    let history = store.history_for(&sealed.sha256_hash).expect("history");
    assert_eq!(history.len(), 1);
}

// ============================================================================
// SECTION: Append-Only Guards
// ============================================================================

#[test]
fn business_events_reject_raw_sql_mutation() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));

    store
        .append_business_event(BusinessEvent {
            kind: "suite.frozen".to_string(),
            payload: json!({"suite": "sales-core"}),
            occurred_at: now(),
        })
        .expect("append event");

    let raw = raw_connection(&dir);
    assert!(
        raw.execute("UPDATE business_events SET kind = 'forged'", []).is_err(),
        "updates must abort via trigger"
    );
    assert!(
        raw.execute("DELETE FROM business_events", []).is_err(),
        "deletes must abort via trigger"
    );
    assert_eq!(store.business_events().expect("read").len(), 1);
}

#[test]
fn audit_log_rejects_raw_sql_mutation() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));
    let actor = AuditActor::system();
    store.create_enterprise(enterprise(1), &actor).expect("create enterprise");

    let raw = raw_connection(&dir);
    assert!(raw.execute("DELETE FROM audit_log", []).is_err());
    assert!(!store.entries(&AuditFilter::default()).expect("read").is_empty());
}

// ============================================================================
// SECTION: Purge Job
// ============================================================================

#[test]
fn hard_purge_is_dry_run_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let clock = Arc::new(ManualClock::new(now()));
    let store = open_store(&dir, clock);
    let actor = AuditActor::system();

    let e1 = enterprise(1);
    store.create_enterprise(e1.clone(), &actor).expect("create enterprise");
    let w1 = workspace(10, e1.enterprise_id);
    store.create_workspace(w1.clone(), &actor).expect("create workspace");
    store
        .soft_delete_workspace(w1.workspace_id, &actor, now())
        .expect("soft delete");

    let far_future = now().saturating_add_days(365);
    let plan = store.run_hard_purge(&PurgeConfig::default(), far_future).expect("plan");
    assert!(plan.dry_run);
    assert_eq!(plan.eligible_workspaces, vec![w1.workspace_id]);

    // The soft-deleted row must survive a dry run.
    let raw = raw_connection(&dir);
    let count: i64 = raw
        .query_row("SELECT COUNT(*) FROM workspaces", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

// ============================================================================
// SECTION: Schema
// ============================================================================

#[test]
fn schema_version_is_recorded_once() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir, Arc::new(ManualClock::new(now())));
    assert_eq!(store.schema_version().expect("version"), 1);

    // Reopening must not duplicate the version row.
    drop(store);
    let reopened = open_store(&dir, Arc::new(ManualClock::new(now())));
    assert_eq!(reopened.schema_version().expect("version"), 1);
}
