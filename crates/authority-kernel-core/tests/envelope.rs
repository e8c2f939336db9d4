// crates/authority-kernel-core/tests/envelope.rs
// ============================================================================
// Module: Envelope Tests
// Description: Canonical payloads, idempotent sealing, and status machine.
// ============================================================================
//! ## Overview
//! Covers canonical hash stability of the envelope payload, idempotent
//! re-sealing through the sealer under a pinned clock, verification
//! classification, one-way status transitions, and the expiry sweeper.

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
use authority_kernel_core::CANONICAL_ENVELOPE_VERSION;
use authority_kernel_core::Clock;
use authority_kernel_core::EnterpriseId;
use authority_kernel_core::EnvelopeBody;
use authority_kernel_core::EnvelopeLocator;
use authority_kernel_core::EnvelopeStatus;
use authority_kernel_core::EnvelopeStore;
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
use authority_kernel_core::VerifyStatus;
use authority_kernel_core::WorkspaceId;
use authority_kernel_core::runtime::EnvelopeSealer;
use authority_kernel_core::runtime::SealError;
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
                policy_version: 3,
                status: PolicyStatus::Active,
                created_at: Timestamp::from_unix_micros(2),
            },
            &actor,
        )
        .expect("create policy");
    store
}

fn seal_request(expires_at: Option<Timestamp>) -> SealRequest {
    SealRequest {
        tenant_id: EnterpriseId::new(Uuid::from_u128(100)),
        workspace_id: WorkspaceId::new(Uuid::from_u128(101)),
        user_id: None,
        sub_vertical_id: SubVerticalId::new("SV1"),
        region_code: None,
        content: json!({"prompt": "qualify the lead", "seed": 7}),
        sealed_by: "sales-bench".to_string(),
        expires_at,
    }
}

// ============================================================================
// SECTION: Canonical Payload
// ============================================================================

#[test]
fn body_hash_is_stable_across_reserialization() {
    let body = EnvelopeBody {
        envelope_version: CANONICAL_ENVELOPE_VERSION.to_string(),
        tenant_id: EnterpriseId::new(Uuid::from_u128(100)),
        workspace_id: WorkspaceId::new(Uuid::from_u128(101)),
        user_id: None,
        persona_id: PersonaId::new(Uuid::from_u128(1)),
        policy_id: PolicyId::new(Uuid::from_u128(2)),
        policy_version: 3,
        territory_id: None,
        persona_resolution_path: "LOCAL(none) \u{2192} REGIONAL(none) \u{2192} GLOBAL"
            .to_string(),
        persona_resolution_scope: PersonaScope::Global,
        territory_resolution_path: "none".to_string(),
        content: json!({"seed": 7}),
        sealed_at: Timestamp::from_unix_micros(1_000),
        sealed_by: "api".to_string(),
        expires_at: None,
    };
    let first = body.compute_hash().expect("hash");
    let round_tripped: EnvelopeBody =
        serde_json::from_slice(&body.canonical_bytes().expect("bytes")).expect("reparse");
    let second = round_tripped.compute_hash().expect("hash again");
    assert_eq!(first, second);
}

#[test]
fn unknown_payload_fields_are_rejected() {
    let parsed: Result<EnvelopeBody, _> = serde_json::from_value(json!({
        "envelope_version": CANONICAL_ENVELOPE_VERSION,
        "tenant_id": Uuid::from_u128(100).to_string(),
        "workspace_id": Uuid::from_u128(101).to_string(),
        "persona_id": Uuid::from_u128(1).to_string(),
        "policy_id": Uuid::from_u128(2).to_string(),
        "policy_version": 3,
        "persona_resolution_path": "GLOBAL",
        "persona_resolution_scope": "GLOBAL",
        "territory_resolution_path": "none",
        "content": {},
        "sealed_at": 1000,
        "sealed_by": "api",
        "smuggled": true
    }));
    assert!(parsed.is_err(), "unknown fields must be rejected at parse time");
}

// ============================================================================
// SECTION: Idempotent Seal
// ============================================================================

#[test]
fn identical_content_reseals_to_the_same_envelope() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let first = sealer.seal(seal_request(None)).expect("first seal");
    let second = sealer.seal(seal_request(None)).expect("second seal");

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.envelope_id, second.envelope_id);
    assert_eq!(first.sha256_hash, second.sha256_hash);
    assert_eq!(first.sealed_at, second.sealed_at);
}

#[test]
fn sealed_envelope_verifies_valid_immediately() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let outcome = sealer.seal(seal_request(None)).expect("seal");
    let verify = store
        .verify(&EnvelopeLocator::by_id(outcome.envelope_id), clock.now())
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Valid);
    assert_eq!(verify.sha256_hash, Some(outcome.sha256_hash));
}

#[test]
fn sealing_refuses_when_resolution_fails() {
    let store = InMemoryStore::new();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let err = sealer.seal(seal_request(None)).unwrap_err();
    assert!(matches!(err, SealError::Resolve(_)));
    let verify = store
        .verify(
            &EnvelopeLocator {
                envelope_id: None,
                sha256_hash: Some(authority_kernel_core::hash_bytes(b"anything")),
            },
            clock.now(),
        )
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::NotSealed, "nothing may be written on refusal");
}

// ============================================================================
// SECTION: Status Machine
// ============================================================================

#[test]
fn revoke_is_terminal_and_one_way() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let outcome = sealer.seal(seal_request(None)).expect("seal");
    let revoked = store
        .revoke(outcome.envelope_id, "compliance", clock.now())
        .expect("revoke");
    assert_eq!(revoked.status, EnvelopeStatus::Revoked);
    assert!(store.revoke(outcome.envelope_id, "compliance", clock.now()).is_err());

    let verify = store
        .verify(&EnvelopeLocator::by_id(outcome.envelope_id), clock.now())
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Revoked);
}

#[test]
fn expiry_sweeper_transitions_past_due_envelopes() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let expires_at = Timestamp::from_unix_micros(6_000);
    let outcome = sealer.seal(seal_request(Some(expires_at))).expect("seal");

    assert_eq!(store.sweep_expired(Timestamp::from_unix_micros(5_500)).expect("sweep"), 0);
    assert_eq!(store.sweep_expired(Timestamp::from_unix_micros(7_000)).expect("sweep"), 1);

    let verify = store
        .verify(
            &EnvelopeLocator::by_id(outcome.envelope_id),
            Timestamp::from_unix_micros(7_000),
        )
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Expired);
}

#[test]
fn past_expiry_fails_verification_before_the_sweeper_runs() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let outcome = sealer
        .seal(seal_request(Some(Timestamp::from_unix_micros(5_100))))
        .expect("seal");
    let verify = store
        .verify(
            &EnvelopeLocator::by_id(outcome.envelope_id),
            Timestamp::from_unix_micros(6_000),
        )
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Expired);
}

// ============================================================================
// SECTION: Lookup Contracts
// ============================================================================

#[test]
fn empty_locator_is_rejected() {
    let store = InMemoryStore::new();
    assert!(store.find(&EnvelopeLocator::default()).is_err());
}

#[test]
fn content_round_trips_canonical_bytes() {
    let store = seeded_store();
    let clock = ManualClock::new(Timestamp::from_unix_micros(5_000));
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let outcome = sealer.seal(seal_request(None)).expect("seal");
    let bytes = store
        .content(&EnvelopeLocator::by_hash(outcome.sha256_hash.clone()))
        .expect("content");
    assert_eq!(authority_kernel_core::hash_bytes(&bytes), outcome.sha256_hash);
}
