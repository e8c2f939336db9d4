// crates/authority-kernel-core/tests/gate.rs
// ============================================================================
// Module: Runtime Gate Tests
// Description: Decision table and violation recording for the admission point.
// ============================================================================
//! ## Overview
//! Exercises every row of the gate decision table: missing claims, unknown
//! identifiers, revoked and expired envelopes, and admission of sealed
//! envelopes, asserting the recorded violation rows alongside.

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

use authority_kernel_core::AuditActor;
use authority_kernel_core::AuthorityStore;
use authority_kernel_core::Clock;
use authority_kernel_core::EnterpriseId;
use authority_kernel_core::EnvelopeLocator;
use authority_kernel_core::EnvelopeStore;
use authority_kernel_core::GateRequest;
use authority_kernel_core::GateSource;
use authority_kernel_core::InMemoryStore;
use authority_kernel_core::ManualClock;
use authority_kernel_core::Persona;
use authority_kernel_core::PersonaId;
use authority_kernel_core::PersonaScope;
use authority_kernel_core::Policy;
use authority_kernel_core::PolicyId;
use authority_kernel_core::PolicyStatus;
use authority_kernel_core::SequentialIdSource;
use authority_kernel_core::SubVerticalId;
use authority_kernel_core::Timestamp;
use authority_kernel_core::ViolationCode;
use authority_kernel_core::ViolationLog;
use authority_kernel_core::ViolationResolution;
use authority_kernel_core::WorkspaceId;
use authority_kernel_core::hash_bytes;
use authority_kernel_core::runtime::EnvelopeSealer;
use authority_kernel_core::runtime::RuntimeGate;
use authority_kernel_core::runtime::SealRequest;
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let actor = AuditActor::system();
    let persona = Persona {
        persona_id: PersonaId::new(Uuid::from_u128(1)),
        scope: PersonaScope::Global,
        sub_vertical_id: SubVerticalId::new("SV1"),
        region_code: None,
        is_active: true,
        created_at: Timestamp::from_unix_micros(1),
    };
    store.create_persona(persona.clone(), &actor).expect("create persona");
    store
        .create_policy(
            Policy {
                policy_id: PolicyId::new(Uuid::from_u128(2)),
                persona_id: persona.persona_id,
                policy_version: 1,
                status: PolicyStatus::Active,
                created_at: Timestamp::from_unix_micros(2),
            },
            &actor,
        )
        .expect("create policy");
    store
}

fn seal(store: &InMemoryStore, clock: &ManualClock, expires_at: Option<Timestamp>) -> EnvelopeLocator {
    let ids = SequentialIdSource::new(500);
    let sealer = EnvelopeSealer::new(store, store, &ids, clock);
    let outcome = sealer
        .seal(SealRequest {
            tenant_id: EnterpriseId::new(Uuid::from_u128(100)),
            workspace_id: WorkspaceId::new(Uuid::from_u128(101)),
            user_id: None,
            sub_vertical_id: SubVerticalId::new("SV1"),
            region_code: None,
            content: json!({"seed": 11}),
            sealed_by: "api".to_string(),
            expires_at,
        })
        .expect("seal");
    EnvelopeLocator::by_hash(outcome.sha256_hash)
}

fn request(claimed: EnvelopeLocator) -> GateRequest {
    GateRequest {
        source: GateSource::Api,
        endpoint: "/v1/reason".to_string(),
        method: "POST".to_string(),
        tenant_id: EnterpriseId::new(Uuid::from_u128(100)),
        workspace_id: Some(WorkspaceId::new(Uuid::from_u128(101))),
        user_id: None,
        claimed,
    }
}

// ============================================================================
// SECTION: Decision Table
// ============================================================================

#[test]
fn missing_claim_blocks_with_no_envelope() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);

    let decision = gate.check(request(EnvelopeLocator::default())).expect("gate check");
    assert!(!decision.admitted);
    let violation = decision.violation.expect("violation recorded");
    assert_eq!(violation.violation_code, ViolationCode::NoEnvelope);
    assert_eq!(violation.resolution_status, ViolationResolution::Open);

    let stored = store.violations(Some(ViolationCode::NoEnvelope)).expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].request.endpoint, "/v1/reason");
}

#[test]
fn unknown_hash_blocks_with_invalid_envelope() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);

    let claimed = EnvelopeLocator::by_hash(hash_bytes(b"never sealed"));
    let decision = gate.check(request(claimed)).expect("gate check");
    assert!(!decision.admitted);
    assert_eq!(
        decision.violation.expect("violation").violation_code,
        ViolationCode::InvalidEnvelope
    );
}

#[test]
fn revoked_envelope_blocks_with_revoked_code() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let claimed = seal(&store, &clock, None);
    let envelope = store.find(&claimed).expect("find").expect("sealed envelope");
    store.revoke(envelope.envelope_id, "compliance", clock.now()).expect("revoke");

    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);
    let decision = gate.check(request(claimed)).expect("gate check");
    assert_eq!(
        decision.violation.expect("violation").violation_code,
        ViolationCode::RevokedEnvelope
    );
}

#[test]
fn past_expiry_blocks_even_while_status_is_sealed() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let claimed = seal(&store, &clock, Some(Timestamp::from_unix_micros(999)));

    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);
    let decision = gate.check(request(claimed)).expect("gate check");
    assert_eq!(
        decision.violation.expect("violation").violation_code,
        ViolationCode::ExpiredEnvelope
    );
}

#[test]
fn sealed_envelope_is_admitted_with_its_binding() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let claimed = seal(&store, &clock, None);

    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);
    let decision = gate.check(request(claimed)).expect("gate check");
    assert!(decision.admitted);
    let envelope = decision.envelope.expect("bound envelope");
    assert_eq!(envelope.body.persona_id, PersonaId::new(Uuid::from_u128(1)));
    assert!(decision.violation.is_none());
    assert!(store.violations(None).expect("list").is_empty());
}

// ============================================================================
// SECTION: Violation Resolution Metadata
// ============================================================================

#[test]
fn violation_resolution_is_metadata_only() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(1_000));
    let ids = SequentialIdSource::new(900);
    let gate = RuntimeGate::new(&store, &store, &ids, &clock);

    let decision = gate.check(request(EnvelopeLocator::default())).expect("gate check");
    let violation = decision.violation.expect("violation");
    store
        .set_resolution(
            violation.violation_id,
            ViolationResolution::Resolved,
            Some("reviewed".to_string()),
        )
        .expect("resolve");

    let stored = store.violations(None).expect("list");
    assert_eq!(stored[0].resolution_status, ViolationResolution::Resolved);
    assert_eq!(stored[0].violation_code, ViolationCode::NoEnvelope, "code never changes");
}
