// crates/authority-kernel-governance/tests/calibration.rs
// ============================================================================
// Module: Human Calibration Tests
// Description: Sessions, tokenized invites, seeded queues, and the rho gate.
// ============================================================================
//! ## Overview
//! Walks the calibration sub-protocol end to end: invite issuance with
//! deterministic queues, single-holder token access, score submission
//! validation, and session completion gating on Spearman rho against the
//! machine baseline.

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

use std::collections::BTreeSet;

use authority_kernel_core::AuditActor;
use authority_kernel_core::InMemoryStore;
use authority_kernel_core::ManualClock;
use authority_kernel_core::PersonaId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SequentialIdSource;
use authority_kernel_core::SequentialTokenSource;
use authority_kernel_core::SuiteId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Timestamp;
use authority_kernel_governance::CalibrationSession;
use authority_kernel_governance::DimensionScores;
use authority_kernel_governance::EvaluatorInvite;
use authority_kernel_governance::GovernanceEngine;
use authority_kernel_governance::GovernanceError;
use authority_kernel_governance::GovernanceStore;
use authority_kernel_governance::InMemoryGovernanceStore;
use authority_kernel_governance::InviteStatus;
use authority_kernel_governance::PursueDecision;
use authority_kernel_governance::RunParams;
use authority_kernel_governance::Scenario;
use authority_kernel_governance::ScenarioKind;
use authority_kernel_governance::ScenarioOutcome;
use authority_kernel_governance::ScenarioScorer;
use authority_kernel_governance::ScoreSubmission;
use authority_kernel_governance::ScoredScenario;
use authority_kernel_governance::ScorerError;
use authority_kernel_governance::SessionStatus;
use authority_kernel_governance::SuiteStatus;
use authority_kernel_governance::seeded_shuffle;
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct Harness {
    governance: InMemoryGovernanceStore,
    audit: InMemoryStore,
    ids: SequentialIdSource,
    tokens: SequentialTokenSource,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        Self {
            governance: InMemoryGovernanceStore::new(),
            audit: InMemoryStore::new(),
            ids: SequentialIdSource::new(1),
            tokens: SequentialTokenSource::new(1),
            clock: ManualClock::new(Timestamp::from_unix_micros(1_000_000)),
        }
    }

    fn engine(&self) -> GovernanceEngine<'_, InMemoryGovernanceStore, InMemoryStore> {
        GovernanceEngine::new(&self.governance, &self.audit, &self.ids, &self.tokens, &self.clock)
    }
}

fn scores(level: f64) -> DimensionScores {
    DimensionScores {
        qualification: level,
        needs_discovery: level,
        value_articulation: level,
        objection_handling: level,
        process_adherence: level,
        compliance: level,
        relationship_building: level,
        next_step_secured: level,
    }
}

/// Golden scenarios pass high, kill scenarios are blocked low.
struct CleanScorer;

impl ScenarioScorer for CleanScorer {
    fn score(
        &self,
        scenario: &Scenario,
        _persona_id: PersonaId,
    ) -> Result<ScoredScenario, ScorerError> {
        Ok(match scenario.kind {
            ScenarioKind::Golden => ScoredScenario {
                outcome: ScenarioOutcome::Pass,
                dimensions: scores(4.5),
                latency_ms: 5,
            },
            ScenarioKind::Kill => ScoredScenario {
                outcome: ScenarioOutcome::Block,
                dimensions: scores(1.5),
                latency_ms: 5,
            },
        })
    }
}

fn emails(count: usize) -> Vec<String> {
    (0 .. count).map(|index| format!("evaluator-{index}@example.test")).collect()
}

fn deadline() -> Timestamp {
    Timestamp::from_unix_micros(1_000_000).saturating_add_days(7)
}

/// Builds a SYSTEM_VALIDATED suite with two golden and two kill scenarios.
fn validated_suite(harness: &Harness) -> SuiteId {
    let engine = harness.engine();
    let actor = AuditActor::system();
    let suite = engine.create_suite(&SuiteKey::new("sales-core"), &actor).expect("create");
    for (scenario_id, kind) in [
        ("golden-00", ScenarioKind::Golden),
        ("golden-01", ScenarioKind::Golden),
        ("kill-00", ScenarioKind::Kill),
        ("kill-01", ScenarioKind::Kill),
    ] {
        engine
            .add_scenario(
                suite.suite_id,
                ScenarioId::new(scenario_id),
                kind,
                json!({"id": scenario_id}),
                &actor,
            )
            .expect("add scenario");
    }
    engine.freeze(suite.suite_id, &actor).expect("freeze");
    let (_, suite) = engine
        .run_system_validation(
            suite.suite_id,
            RunParams {
                siva_version: "siva-2.4.1".to_string(),
                code_commit_sha: "0f3c1a9".to_string(),
                environment: "staging".to_string(),
                persona_id: PersonaId::new(Uuid::from_u128(77)),
                fan_out: 2,
            },
            &CleanScorer,
            &actor,
        )
        .expect("run");
    assert_eq!(suite.status, SuiteStatus::SystemValidated);
    suite.suite_id
}

fn start_session(
    harness: &Harness,
    suite_id: SuiteId,
    evaluators: usize,
) -> (CalibrationSession, Vec<EvaluatorInvite>) {
    harness
        .engine()
        .start_human_calibration(suite_id, &emails(evaluators), deadline(), &AuditActor::system())
        .expect("start calibration")
}

/// Submits scores for every scenario in the invite's queue; golden high,
/// kill low when `aligned`, inverted otherwise.
fn score_invite(harness: &Harness, suite_id: SuiteId, invite: &EvaluatorInvite, aligned: bool) {
    let engine = harness.engine();
    let scenarios = harness.governance.scenarios(suite_id).expect("scenarios");
    let queue = harness.governance.queue_for(invite.invite_id).expect("queue");
    for scenario_id in queue {
        let kind = scenarios
            .iter()
            .find(|scenario| scenario.scenario_id == scenario_id)
            .expect("queued scenario exists")
            .kind;
        let level = match (kind, aligned) {
            (ScenarioKind::Golden, true) | (ScenarioKind::Kill, false) => 5.0,
            (ScenarioKind::Golden, false) | (ScenarioKind::Kill, true) => 1.0,
        };
        engine
            .submit_score(
                invite.invite_id,
                ScoreSubmission {
                    scenario_id,
                    dimensions: scores(level),
                    would_pursue: if level > 3.0 {
                        PursueDecision::Yes
                    } else {
                        PursueDecision::No
                    },
                    confidence: 4,
                },
            )
            .expect("submit score");
    }
}

// ============================================================================
// SECTION: Session Preconditions
// ============================================================================

#[test]
fn calibration_requires_a_system_validated_suite() {
    let harness = Harness::new();
    let engine = harness.engine();
    let actor = AuditActor::system();
    let suite = engine.create_suite(&SuiteKey::new("sales-core"), &actor).expect("create");
    let err = engine
        .start_human_calibration(suite.suite_id, &emails(3), deadline(), &actor)
        .unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::InvalidStatus {
            current_status: SuiteStatus::Draft,
            ..
        }
    ));
}

#[test]
fn calibration_requires_at_least_two_evaluators() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let err = harness
        .engine()
        .start_human_calibration(suite_id, &emails(1), deadline(), &AuditActor::system())
        .unwrap_err();
    assert!(matches!(err, GovernanceError::TooFewEvaluators { .. }));
}

// ============================================================================
// SECTION: Invites and Queues
// ============================================================================

#[test]
fn invites_carry_unique_tokens_and_padded_expiry() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 3);

    assert_eq!(invites.len(), 3);
    let tokens: BTreeSet<&str> = invites.iter().map(|invite| invite.token.as_str()).collect();
    assert_eq!(tokens.len(), 3, "tokens are single-holder");
    for invite in &invites {
        assert_eq!(invite.expires_at, deadline().saturating_add_days(1));
        assert_eq!(invite.status, InviteStatus::Pending);
    }
}

#[test]
fn queues_follow_the_seeded_shuffle() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 2);
    let scenarios = harness.governance.scenarios(suite_id).expect("scenarios");

    for invite in &invites {
        let queue = harness.governance.queue_for(invite.invite_id).expect("queue");
        let expected: Vec<ScenarioId> = seeded_shuffle(invite.evaluator_index, scenarios.len())
            .into_iter()
            .map(|position| scenarios[position].scenario_id.clone())
            .collect();
        assert_eq!(queue, expected, "queue order derives from (evaluator_index, count)");
    }
}

// ============================================================================
// SECTION: Token Access
// ============================================================================

#[test]
fn first_access_pins_metadata_and_later_accesses_resume() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 2);
    let engine = harness.engine();

    let (first, queue) = engine
        .access_invite(&invites[0].token, "agent/1.0", "203.0.113.9")
        .expect("first access");
    assert!(first.first_accessed_at.is_some());
    assert_eq!(first.first_user_agent.as_deref(), Some("agent/1.0"));
    assert_eq!(queue.len(), 4);

    harness.clock.advance_micros(1_000_000);
    let (second, _) = engine
        .access_invite(&invites[0].token, "agent/2.0", "198.51.100.7")
        .expect("second access");
    assert_eq!(
        second.first_accessed_at, first.first_accessed_at,
        "later accesses must not overwrite first-access metadata"
    );
    assert_eq!(second.first_user_agent.as_deref(), Some("agent/1.0"));
}

#[test]
fn expired_tokens_are_refused() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 2);

    harness.clock.set(deadline().saturating_add_days(2));
    let err = harness
        .engine()
        .access_invite(&invites[0].token, "agent/1.0", "203.0.113.9")
        .unwrap_err();
    assert!(matches!(err, GovernanceError::TokenExpired));
}

// ============================================================================
// SECTION: Score Submission
// ============================================================================

#[test]
fn submissions_validate_queue_membership_and_ranges() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 2);
    let engine = harness.engine();

    let unknown = engine.submit_score(
        invites[0].invite_id,
        ScoreSubmission {
            scenario_id: ScenarioId::new("not-in-suite"),
            dimensions: scores(3.0),
            would_pursue: PursueDecision::Maybe,
            confidence: 3,
        },
    );
    assert!(unknown.is_err());

    let out_of_range = engine.submit_score(
        invites[0].invite_id,
        ScoreSubmission {
            scenario_id: ScenarioId::new("golden-00"),
            dimensions: scores(6.0),
            would_pursue: PursueDecision::Yes,
            confidence: 3,
        },
    );
    assert!(out_of_range.is_err());

    engine
        .submit_score(
            invites[0].invite_id,
            ScoreSubmission {
                scenario_id: ScenarioId::new("golden-00"),
                dimensions: scores(4.0),
                would_pursue: PursueDecision::Yes,
                confidence: 3,
            },
        )
        .expect("valid submission");
    let duplicate = engine.submit_score(
        invites[0].invite_id,
        ScoreSubmission {
            scenario_id: ScenarioId::new("golden-00"),
            dimensions: scores(4.0),
            would_pursue: PursueDecision::Yes,
            confidence: 3,
        },
    );
    assert!(duplicate.is_err());
}

#[test]
fn full_coverage_completes_the_invite() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (_, invites) = start_session(&harness, suite_id, 2);

    score_invite(&harness, suite_id, &invites[0], true);
    let stored = harness
        .governance
        .invite(invites[0].invite_id)
        .expect("read")
        .expect("invite");
    assert_eq!(stored.status, InviteStatus::Completed);
}

// ============================================================================
// SECTION: Completion Gate
// ============================================================================

#[test]
fn aligned_evaluators_promote_the_suite() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (session, invites) = start_session(&harness, suite_id, 3);
    for invite in &invites {
        score_invite(&harness, suite_id, invite, true);
    }

    let session = harness
        .engine()
        .complete_session(session.session_id, &AuditActor::system())
        .expect("complete");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.spearman_rho.expect("rho") >= 0.60);
    assert!(session.icc.is_some());

    let suite = harness.governance.suite(suite_id).expect("read").expect("suite");
    assert_eq!(suite.status, SuiteStatus::HumanValidated);
}

#[test]
fn anti_correlated_evaluators_fail_the_gate() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (session, invites) = start_session(&harness, suite_id, 2);
    for invite in &invites {
        score_invite(&harness, suite_id, invite, false);
    }

    let err = harness
        .engine()
        .complete_session(session.session_id, &AuditActor::system())
        .unwrap_err();
    assert!(matches!(err, GovernanceError::CorrelationTooLow { .. }));

    let session = harness
        .governance
        .session(session.session_id)
        .expect("read")
        .expect("session");
    assert_eq!(session.status, SessionStatus::Failed);
    let suite = harness.governance.suite(suite_id).expect("read").expect("suite");
    assert_eq!(suite.status, SuiteStatus::SystemValidated, "the suite is not promoted");
}

#[test]
fn completion_waits_for_every_invite() {
    let harness = Harness::new();
    let suite_id = validated_suite(&harness);
    let (session, invites) = start_session(&harness, suite_id, 2);
    score_invite(&harness, suite_id, &invites[0], true);

    let err = harness
        .engine()
        .complete_session(session.session_id, &AuditActor::system())
        .unwrap_err();
    assert!(matches!(err, GovernanceError::Invalid(_)));
}
