// system-tests/tests/end_to_end.rs
// ============================================================================
// Module: End-to-End Kernel Scenarios
// Description: Cross-crate scenarios from seal to governance promotion.
// ============================================================================
//! ## Overview
//! Drives the kernel the way production does: resolution into sealing, the
//! runtime gate, trace recording, replay with drift detection, store-level
//! invariant rejection, envelope expiry, and the full governance promotion
//! path with human calibration.

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
use authority_kernel_core::AuditLog;
use authority_kernel_core::AuthorityError;
use authority_kernel_core::AuthorityStore;
use authority_kernel_core::Clock;
use authority_kernel_core::ContentHash;
use authority_kernel_core::DriftType;
use authority_kernel_core::Enterprise;
use authority_kernel_core::EnterpriseId;
use authority_kernel_core::EnterpriseStatus;
use authority_kernel_core::EnterpriseType;
use authority_kernel_core::EnvelopeLocator;
use authority_kernel_core::EnvelopeStore;
use authority_kernel_core::ExecutionIdentity;
use authority_kernel_core::GateRequest;
use authority_kernel_core::GateSource;
use authority_kernel_core::IdentityId;
use authority_kernel_core::IdentityMode;
use authority_kernel_core::IdentityRole;
use authority_kernel_core::IdentityStatus;
use authority_kernel_core::InMemoryStore;
use authority_kernel_core::Interaction;
use authority_kernel_core::InteractionId;
use authority_kernel_core::InteractionParams;
use authority_kernel_core::ManualClock;
use authority_kernel_core::Persona;
use authority_kernel_core::PersonaId;
use authority_kernel_core::PersonaScope;
use authority_kernel_core::Policy;
use authority_kernel_core::PolicyId;
use authority_kernel_core::PolicyStatus;
use authority_kernel_core::RegionCode;
use authority_kernel_core::ReplayStatus;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SequentialIdSource;
use authority_kernel_core::SequentialTokenSource;
use authority_kernel_core::SigningSecret;
use authority_kernel_core::SubVerticalId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Territory;
use authority_kernel_core::TerritoryId;
use authority_kernel_core::TerritoryLevel;
use authority_kernel_core::TerritoryStatus;
use authority_kernel_core::Timestamp;
use authority_kernel_core::TraceStore;
use authority_kernel_core::VerifyStatus;
use authority_kernel_core::ViolationCode;
use authority_kernel_core::ViolationLog;
use authority_kernel_core::Workspace;
use authority_kernel_core::WorkspaceId;
use authority_kernel_core::WorkspaceStatus;
use authority_kernel_core::runtime::EnvelopeSealer;
use authority_kernel_core::runtime::ReplayEngine;
use authority_kernel_core::runtime::Resolver;
use authority_kernel_core::runtime::RuntimeGate;
use authority_kernel_core::runtime::SealRequest;
use authority_kernel_core::verify_interaction_signature;
use authority_kernel_governance::DimensionScores;
use authority_kernel_governance::GovernanceEngine;
use authority_kernel_governance::GovernanceRole;
use authority_kernel_governance::GovernanceStore;
use authority_kernel_governance::InMemoryGovernanceStore;
use authority_kernel_governance::PursueDecision;
use authority_kernel_governance::RunParams;
use authority_kernel_governance::RunStatus;
use authority_kernel_governance::Scenario;
use authority_kernel_governance::ScenarioKind;
use authority_kernel_governance::ScenarioOutcome;
use authority_kernel_governance::ScenarioScorer;
use authority_kernel_governance::ScoreSubmission;
use authority_kernel_governance::ScoredScenario;
use authority_kernel_governance::ScorerError;
use authority_kernel_governance::SessionStatus;
use authority_kernel_governance::SuiteStatus;
use authority_kernel_store_sqlite::SqliteKernelStore;
use authority_kernel_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const SUB_VERTICAL: &str = "SV1";

fn start() -> Timestamp {
    Timestamp::from_unix_micros(1_700_000_000_000_000)
}

/// Seeds enterprise E1 (REAL, UAE), workspace W1, a GLOBAL persona with an
/// active policy, a REGIONAL UAE persona with an active policy, and a
/// country-level UAE territory.
fn seeded_authority() -> (InMemoryStore, EnterpriseId, WorkspaceId, PersonaId) {
    let store = InMemoryStore::new();
    let actor = AuditActor::system();

    let e1 = Enterprise {
        enterprise_id: EnterpriseId::new(Uuid::from_u128(1)),
        name: "E1".to_string(),
        enterprise_type: EnterpriseType::Real,
        region: "UAE".to_string(),
        status: EnterpriseStatus::Active,
        created_at: start(),
    };
    store.create_enterprise(e1.clone(), &actor).expect("create enterprise");
    let w1 = Workspace {
        workspace_id: WorkspaceId::new(Uuid::from_u128(2)),
        enterprise_id: e1.enterprise_id,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        name: "W1".to_string(),
        status: WorkspaceStatus::Active,
        created_at: start(),
        deleted_at: None,
    };
    store.create_workspace(w1.clone(), &actor).expect("create workspace");

    let global = Persona {
        persona_id: PersonaId::new(Uuid::from_u128(10)),
        scope: PersonaScope::Global,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        region_code: None,
        is_active: true,
        created_at: start(),
    };
    let regional = Persona {
        persona_id: PersonaId::new(Uuid::from_u128(11)),
        scope: PersonaScope::Regional,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        region_code: Some(RegionCode::new("UAE")),
        is_active: true,
        created_at: start().saturating_add_seconds(1),
    };
    store.create_persona(global.clone(), &actor).expect("create global persona");
    store.create_persona(regional.clone(), &actor).expect("create regional persona");
    for (raw_id, persona_id) in [(20u128, global.persona_id), (21, regional.persona_id)] {
        store
            .create_policy(
                Policy {
                    policy_id: PolicyId::new(Uuid::from_u128(raw_id)),
                    persona_id,
                    policy_version: 1,
                    status: PolicyStatus::Active,
                    created_at: start(),
                },
                &actor,
            )
            .expect("create policy");
    }

    store
        .create_territory(
            Territory {
                territory_id: TerritoryId::new(Uuid::from_u128(30)),
                slug: "uae".to_string(),
                name: "United Arab Emirates".to_string(),
                level: TerritoryLevel::Country,
                region_code: Some(RegionCode::new("UAE")),
                country_code: Some("UAE".to_string()),
                coverage_type: TerritoryLevel::Country.default_coverage(),
                status: TerritoryStatus::Active,
                created_at: start(),
            },
            &actor,
        )
        .expect("create territory");

    (store, e1.enterprise_id, w1.workspace_id, regional.persona_id)
}

fn seal_request(
    tenant_id: EnterpriseId,
    workspace_id: WorkspaceId,
    content: Value,
) -> SealRequest {
    SealRequest {
        tenant_id,
        workspace_id,
        user_id: None,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        region_code: Some(RegionCode::new("UAE-DUBAI")),
        content,
        sealed_by: "sales-bench".to_string(),
        expires_at: None,
    }
}

fn gate_request(tenant_id: EnterpriseId, claimed: EnvelopeLocator) -> GateRequest {
    GateRequest {
        source: GateSource::SalesBench,
        endpoint: "/v1/reason".to_string(),
        method: "POST".to_string(),
        tenant_id,
        workspace_id: None,
        user_id: None,
        claimed,
    }
}

// ============================================================================
// SECTION: Scenario 1 - Golden Seal and Gate
// ============================================================================

#[test]
fn golden_seal_resolves_the_regional_persona_and_admits_the_call() {
    let (store, tenant, workspace, regional_persona) = seeded_authority();
    let clock = ManualClock::new(start());
    let ids = SequentialIdSource::new(1_000);

    let resolver = Resolver::new(&store);
    let persona = resolver
        .resolve_persona(&SubVerticalId::new(SUB_VERTICAL), Some(&RegionCode::new("UAE-DUBAI")))
        .expect("resolve persona");
    assert_eq!(persona.persona_id, regional_persona);
    assert_eq!(persona.resolution_path, "LOCAL(UAE-DUBAI) \u{2192} REGIONAL(UAE)");

    let territory = resolver
        .resolve_territory(
            &RegionCode::new("UAE-DUBAI"),
            Some(&SubVerticalId::new(SUB_VERTICAL)),
        )
        .expect("resolve territory");
    assert_eq!(territory.resolution_depth, 2);

    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);
    let sealed = sealer
        .seal(seal_request(tenant, workspace, json!({"lead": "acme", "seed": 42})))
        .expect("seal");

    let gate = RuntimeGate::new(&store, &store, &ids, &clock);
    let admitted = gate
        .check(gate_request(tenant, EnvelopeLocator::by_hash(sealed.sha256_hash.clone())))
        .expect("gate check");
    assert!(admitted.admitted);
    let envelope = admitted.envelope.expect("bound envelope");
    assert_eq!(envelope.body.persona_id, regional_persona);
    assert!(envelope.body.territory_id.is_some());

    let blocked = gate
        .check(gate_request(tenant, EnvelopeLocator::default()))
        .expect("gate check without claim");
    assert!(!blocked.admitted);
    assert_eq!(
        blocked.violation.expect("violation").violation_code,
        ViolationCode::NoEnvelope
    );
    assert_eq!(store.violations(Some(ViolationCode::NoEnvelope)).expect("rows").len(), 1);
}

// ============================================================================
// SECTION: Scenario 2 - Idempotent Re-Seal
// ============================================================================

#[test]
fn identical_content_reseals_idempotently_and_verifies_valid() {
    let (store, tenant, workspace, _) = seeded_authority();
    let clock = ManualClock::new(start());
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let content = json!({"lead": "acme", "seed": 42});
    let first = sealer
        .seal(seal_request(tenant, workspace, content.clone()))
        .expect("first seal");
    let second = sealer
        .seal(seal_request(tenant, workspace, content))
        .expect("second seal");

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.envelope_id, second.envelope_id);
    assert_eq!(first.sha256_hash, second.sha256_hash);

    let verify = store
        .verify(&EnvelopeLocator::by_id(first.envelope_id), clock.now())
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Valid);
}

// ============================================================================
// SECTION: Scenario 3 - Drift Detection
// ============================================================================

#[test]
fn replay_with_a_different_hash_is_drift() {
    let (store, tenant, workspace, _) = seeded_authority();
    let clock = ManualClock::new(start());
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);
    let sealed = sealer
        .seal(seal_request(tenant, workspace, json!({"seed": 42})))
        .expect("seal");

    let engine = ReplayEngine::new(&store, &store, &ids, &clock);
    let initiation = engine
        .initiate_replay(
            sealed.sha256_hash.clone(),
            json!({"seed": 42}),
            "auditor",
            GateSource::SalesBench,
        )
        .expect("initiate");
    assert_eq!(initiation.attempt.replay_status, ReplayStatus::Pending);

    let drifted = authority_kernel_core::hash_bytes(b"nondeterministic output");
    let completed = engine
        .complete_replay(initiation.attempt.replay_id, &json!({}), Some(drifted.clone()))
        .expect("complete");
    assert_eq!(completed.replay_status, ReplayStatus::DriftDetected);
    let details = completed.drift_details.expect("drift details");
    assert_eq!(details.drift_type, DriftType::HashMismatch);
    assert_eq!(details.original_hash, sealed.sha256_hash);
    assert_eq!(details.replay_hash, drifted);
}

// ============================================================================
// SECTION: Scenario 4 - Cross-Enterprise Attempt (Durable Store)
// ============================================================================

#[test]
fn cross_enterprise_update_is_rejected_with_a_failure_audit_row() {
    let dir = TempDir::new().expect("tempdir");
    let clock = Arc::new(ManualClock::new(start()));
    let store = SqliteKernelStore::open_with_clock(
        &SqliteStoreConfig::for_path(dir.path().join("kernel.db")),
        clock,
    )
    .expect("open store");
    let actor = AuditActor::system();

    let e1 = Enterprise {
        enterprise_id: EnterpriseId::new(Uuid::from_u128(1)),
        name: "E1".to_string(),
        enterprise_type: EnterpriseType::Real,
        region: "UAE".to_string(),
        status: EnterpriseStatus::Active,
        created_at: start(),
    };
    store.create_enterprise(e1.clone(), &actor).expect("create enterprise");
    let w1 = Workspace {
        workspace_id: WorkspaceId::new(Uuid::from_u128(2)),
        enterprise_id: e1.enterprise_id,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        name: "W1".to_string(),
        status: WorkspaceStatus::Active,
        created_at: start(),
        deleted_at: None,
    };
    store.create_workspace(w1.clone(), &actor).expect("create workspace");
    let user = ExecutionIdentity {
        user_id: IdentityId::new(Uuid::from_u128(3)),
        enterprise_id: e1.enterprise_id,
        workspace_id: w1.workspace_id,
        sub_vertical_id: SubVerticalId::new(SUB_VERTICAL),
        role: IdentityRole::User,
        mode: IdentityMode::Real,
        status: IdentityStatus::Active,
        created_at: start(),
    };
    store.create_identity(user.clone(), &actor).expect("create identity");

    let e2 = EnterpriseId::new(Uuid::from_u128(99));
    let err = store
        .reassign_identity(user.user_id, Some(e2), None, &actor)
        .unwrap_err();
    assert!(matches!(err, AuthorityError::CrossEnterpriseForbidden(_)));

    let unchanged = store.identity(user.user_id).expect("read").expect("identity");
    assert_eq!(unchanged.enterprise_id, e1.enterprise_id, "no row mutated");

    let entries = store
        .entries(&authority_kernel_core::AuditFilter {
            target: Some(("execution_identity".to_string(), user.user_id.to_string())),
            ..authority_kernel_core::AuditFilter::default()
        })
        .expect("audit entries");
    let rejection =
        entries.iter().find(|entry| entry.action == "identity.reassign").expect("audited");
    assert!(!rejection.success);
}

// ============================================================================
// SECTION: Scenario 5 - Governance Happy Path
// ============================================================================

/// Golden scenarios pass with one scripted failure; kill scenarios contain.
struct BenchScorer;

impl ScenarioScorer for BenchScorer {
    fn score(
        &self,
        scenario: &Scenario,
        _persona_id: PersonaId,
    ) -> Result<ScoredScenario, ScorerError> {
        let level = |value: f64| DimensionScores {
            qualification: value,
            needs_discovery: value,
            value_articulation: value,
            objection_handling: value,
            process_adherence: value,
            compliance: value,
            relationship_building: value,
            next_step_secured: value,
        };
        Ok(match scenario.kind {
            ScenarioKind::Golden if scenario.scenario_id.as_str() == "golden-00" => {
                ScoredScenario {
                    outcome: ScenarioOutcome::Fail,
                    dimensions: level(2.0),
                    latency_ms: 12,
                }
            }
            ScenarioKind::Golden => ScoredScenario {
                outcome: ScenarioOutcome::Pass,
                dimensions: level(4.5),
                latency_ms: 12,
            },
            ScenarioKind::Kill => ScoredScenario {
                outcome: ScenarioOutcome::Block,
                dimensions: level(1.5),
                latency_ms: 9,
            },
        })
    }
}

#[test]
fn governance_promotes_through_every_gate_to_ga() {
    let governance = InMemoryGovernanceStore::new();
    let audit = InMemoryStore::new();
    let ids = SequentialIdSource::new(1);
    let tokens = SequentialTokenSource::new(1);
    let clock = ManualClock::new(start());
    let engine = GovernanceEngine::new(&governance, &audit, &ids, &tokens, &clock);
    let actor = AuditActor::system();

    // DRAFT suite with 20 golden and 20 kill scenarios, then freeze.
    let suite = engine.create_suite(&SuiteKey::new("sales-bench"), &actor).expect("create");
    for index in 0 .. 20 {
        engine
            .add_scenario(
                suite.suite_id,
                ScenarioId::new(format!("golden-{index:02}")),
                ScenarioKind::Golden,
                json!({"case": index}),
                &actor,
            )
            .expect("add golden");
        engine
            .add_scenario(
                suite.suite_id,
                ScenarioId::new(format!("kill-{index:02}")),
                ScenarioKind::Kill,
                json!({"trap": index}),
                &actor,
            )
            .expect("add kill");
    }
    let suite = engine.freeze(suite.suite_id, &actor).expect("freeze");
    assert_eq!(suite.scenario_count, 40);

    // System validation: 19/20 golden (95%) and 20/20 kill containment.
    let (run, suite) = engine
        .run_system_validation(
            suite.suite_id,
            RunParams {
                siva_version: "siva-2.4.1".to_string(),
                code_commit_sha: "4be1d22".to_string(),
                environment: "staging".to_string(),
                persona_id: PersonaId::new(Uuid::from_u128(11)),
                fan_out: 8,
            },
            &BenchScorer,
            &actor,
        )
        .expect("run validation");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.golden_pass_rate.expect("golden") >= 0.90);
    assert!(run.kill_containment_rate.expect("kill") >= 0.95);
    assert!(run.cohens_d.expect("effect") > 1.0);
    assert_eq!(suite.status, SuiteStatus::SystemValidated);

    // Human calibration with three evaluators and a seven-day deadline.
    let deadline = start().saturating_add_days(7);
    let emails = vec![
        "a@example.test".to_string(),
        "b@example.test".to_string(),
        "c@example.test".to_string(),
    ];
    let (session, invites) = engine
        .start_human_calibration(suite.suite_id, &emails, deadline, &actor)
        .expect("start calibration");
    assert_eq!(invites.len(), 3);

    let scenarios = governance.scenarios(suite.suite_id).expect("scenarios");
    for invite in &invites {
        let (accessed, queue) = engine
            .access_invite(&invite.token, "bench-ui/1.0", "203.0.113.7")
            .expect("access invite");
        assert!(accessed.first_accessed_at.is_some());
        assert_eq!(queue.len(), 40);
        for scenario_id in queue {
            let kind = scenarios
                .iter()
                .find(|scenario| scenario.scenario_id == scenario_id)
                .expect("scenario")
                .kind;
            let value = match kind {
                ScenarioKind::Golden => 5.0,
                ScenarioKind::Kill => 1.0,
            };
            engine
                .submit_score(
                    invite.invite_id,
                    ScoreSubmission {
                        scenario_id,
                        dimensions: DimensionScores {
                            qualification: value,
                            needs_discovery: value,
                            value_articulation: value,
                            objection_handling: value,
                            process_adherence: value,
                            compliance: value,
                            relationship_building: value,
                            next_step_secured: value,
                        },
                        would_pursue: if value > 3.0 {
                            PursueDecision::Yes
                        } else {
                            PursueDecision::No
                        },
                        confidence: 5,
                    },
                )
                .expect("submit score");
        }
    }

    let session = engine.complete_session(session.session_id, &actor).expect("complete");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.spearman_rho.expect("rho") >= 0.60);

    let suite = governance.suite(suite.suite_id).expect("read").expect("suite");
    assert_eq!(suite.status, SuiteStatus::HumanValidated);

    let suite = engine
        .approve_for_ga(suite.suite_id, &actor, GovernanceRole::CalibrationAdmin)
        .expect("approve");
    assert_eq!(suite.status, SuiteStatus::GaApproved);
}

// ============================================================================
// SECTION: Scenario 6 - Expired Envelope
// ============================================================================

#[test]
fn expired_envelopes_block_at_the_gate_and_sweep_to_expired() {
    let (store, tenant, workspace, _) = seeded_authority();
    let clock = ManualClock::new(start());
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);

    let mut request = seal_request(tenant, workspace, json!({"seed": 6}));
    request.expires_at = Some(start().saturating_add_seconds(-1));
    let sealed = sealer.seal(request).expect("seal");

    let gate = RuntimeGate::new(&store, &store, &ids, &clock);
    let decision = gate
        .check(gate_request(tenant, EnvelopeLocator::by_hash(sealed.sha256_hash.clone())))
        .expect("gate check");
    assert_eq!(
        decision.violation.expect("violation").violation_code,
        ViolationCode::ExpiredEnvelope
    );

    assert_eq!(store.sweep_expired(clock.now()).expect("sweep"), 1);
    let verify = store
        .verify(&EnvelopeLocator::by_id(sealed.envelope_id), clock.now())
        .expect("verify");
    assert_eq!(verify.status, VerifyStatus::Expired);
}

// ============================================================================
// SECTION: Trace Evidence Round Trip
// ============================================================================

#[test]
fn admitted_calls_record_signed_interactions_that_replay_clean() {
    let (store, tenant, workspace, regional_persona) = seeded_authority();
    let clock = ManualClock::new(start());
    let ids = SequentialIdSource::new(1_000);
    let sealer = EnvelopeSealer::new(&store, &store, &ids, &clock);
    let sealed = sealer
        .seal(seal_request(tenant, workspace, json!({"seed": 42})))
        .expect("seal");

    let secret = SigningSecret::new(b"production-trace-key").expect("secret");
    let interaction = Interaction::record(
        InteractionParams {
            envelope_sha256: sealed.sha256_hash.clone(),
            envelope_version: "1.0".to_string(),
            persona_id: regional_persona,
            persona_version: 1,
            policy_version: 1,
            model_slug: "reasoner-large".to_string(),
            routing_decision: json!({"route": "default"}),
            tools_allowed: vec!["crm_lookup".to_string()],
            tools_used: Vec::new(),
            policy_gates_hit: Vec::new(),
            evidence_used: Vec::new(),
            tokens_in: 900,
            tokens_out: 120,
            cost_estimate: 0.002,
            cache_hit: false,
            risk_score: 0.2,
            outcome: "COMPLETED".to_string(),
        },
        InteractionId::new(Uuid::from_u128(9_000)),
        clock.now(),
        &secret,
    )
    .expect("record interaction");
    TraceStore::append(&store, interaction.clone()).expect("append trace");

    let stored = store
        .interactions_for(&sealed.sha256_hash)
        .expect("interactions")
        .into_iter()
        .next()
        .expect("one interaction");
    assert!(verify_interaction_signature(
        &secret,
        &stored.interaction_id,
        &stored.envelope_sha256,
        &stored.outcome,
        &stored.signature,
    ));

    let engine = ReplayEngine::new(&store, &store, &ids, &clock);
    let initiation = engine
        .initiate_replay(
            sealed.sha256_hash.clone(),
            json!({"replay_of": stored.interaction_id.to_string()}),
            "auditor",
            GateSource::Internal,
        )
        .expect("initiate");
    let content = initiation.content.expect("content");
    let replayed: Value = serde_json::from_slice(&content).expect("reparse");
    let completed = engine
        .complete_replay(
            initiation.attempt.replay_id,
            &replayed,
            Some(ContentHash::parse(sealed.sha256_hash.as_str()).expect("parse")),
        )
        .expect("complete");
    assert_eq!(completed.replay_status, ReplayStatus::Success);
}
