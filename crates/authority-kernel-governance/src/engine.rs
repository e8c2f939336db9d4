// crates/authority-kernel-governance/src/engine.rs
// ============================================================================
// Module: Governance Engine
// Description: Suite lifecycle commands, validation runs, and calibration.
// Purpose: Execute the promotion state machine with enforced preconditions.
// Dependencies: authority-kernel-core, serde_json, crate::{calibration,
// stats, store, suite, validation}
// ============================================================================

//! ## Overview
//! The engine is the single command surface over suite governance. Every
//! command checks its precondition on entry and reports `INVALID_STATUS`
//! with the current status and required action on failure. Scenario scoring
//! fans out over a bounded worker pool; the finished run and its result rows
//! commit in one atomic unit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use authority_kernel_core::AuditActor;
use authority_kernel_core::AuditEntry;
use authority_kernel_core::AuditEntryParams;
use authority_kernel_core::AuditLog;
use authority_kernel_core::Clock;
use authority_kernel_core::IdSource;
use authority_kernel_core::InviteId;
use authority_kernel_core::PersonaId;
use authority_kernel_core::RunId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SessionId;
use authority_kernel_core::SuiteId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Timestamp;
use authority_kernel_core::TokenSource;
use authority_kernel_core::hash_canonical_json;
use serde_json::Value;
use serde_json::json;

use crate::calibration::CalibrationSession;
use crate::calibration::EvaluatorInvite;
use crate::calibration::HumanScore;
use crate::calibration::InviteStatus;
use crate::calibration::ScoreSubmission;
use crate::calibration::SessionStatus;
use crate::calibration::seeded_shuffle;
use crate::stats::cohens_d;
use crate::stats::icc2_1;
use crate::stats::spearman_rho;
use crate::store::GovernanceStore;
use crate::suite::CORRELATION_THRESHOLD;
use crate::suite::GovernanceError;
use crate::suite::GovernanceRole;
use crate::suite::MIN_EVALUATORS;
use crate::suite::Scenario;
use crate::suite::ScenarioKind;
use crate::suite::Suite;
use crate::suite::SuiteStatus;
use crate::suite::scenario_manifest_hash;
use crate::validation::RunParams;
use crate::validation::RunStatus;
use crate::validation::ScenarioOutcome;
use crate::validation::ScenarioResult;
use crate::validation::ScenarioScorer;
use crate::validation::ScoredScenario;
use crate::validation::ScorerError;
use crate::validation::ValidationRun;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Command surface over suite governance.
pub struct GovernanceEngine<'a, G: GovernanceStore, L: AuditLog> {
    /// Governance persistence.
    store: &'a G,
    /// Audit log receiving one entry per command.
    audit: &'a L,
    /// Identifier source for new records.
    ids: &'a dyn IdSource,
    /// Token source for evaluator invites.
    tokens: &'a dyn TokenSource,
    /// Injected clock.
    clock: &'a dyn Clock,
}

impl<'a, G: GovernanceStore, L: AuditLog> GovernanceEngine<'a, G, L> {
    /// Creates a governance engine.
    #[must_use]
    pub const fn new(
        store: &'a G,
        audit: &'a L,
        ids: &'a dyn IdSource,
        tokens: &'a dyn TokenSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            audit,
            ids,
            tokens,
            clock,
        }
    }

    /// Writes a governance audit entry.
    fn audit_command(
        &self,
        actor: &AuditActor,
        action: &str,
        target_type: &str,
        target_id: String,
        success: bool,
        metadata: Value,
    ) -> Result<(), GovernanceError> {
        self.audit.append(AuditEntry::new(
            AuditEntryParams {
                actor: actor.clone(),
                action: action.to_string(),
                target_type: target_type.to_string(),
                target_id,
                enterprise_id: None,
                success,
                reason: None,
                metadata,
            },
            self.clock.now(),
        ))?;
        Ok(())
    }

    /// Loads a suite or reports it missing.
    fn load_suite(&self, suite_id: SuiteId) -> Result<Suite, GovernanceError> {
        self.store.suite(suite_id)?.ok_or(GovernanceError::NotFound {
            kind: "suite",
            id: suite_id.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Suite lifecycle
    // ------------------------------------------------------------------

    /// Creates a new DRAFT suite version for a lineage key.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Store`] on infrastructure failure.
    pub fn create_suite(
        &self,
        base_suite_key: &SuiteKey,
        actor: &AuditActor,
    ) -> Result<Suite, GovernanceError> {
        let version = self.store.latest_version(base_suite_key)?.saturating_add(1);
        let suite_key = if version == 1 {
            base_suite_key.clone()
        } else {
            SuiteKey::new(format!("{base_suite_key}-v{version}"))
        };
        let suite = Suite {
            suite_id: SuiteId::new(self.ids.next_id()),
            suite_key,
            version,
            base_suite_key: base_suite_key.clone(),
            is_frozen: false,
            scenario_manifest_hash: None,
            scenario_count: 0,
            status: SuiteStatus::Draft,
            deprecated_reason: None,
            created_at: self.clock.now(),
        };
        self.store.insert_suite(suite.clone())?;
        self.audit_command(
            actor,
            "suite.create",
            "suite",
            suite.suite_id.to_string(),
            true,
            json!({ "base_suite_key": suite.base_suite_key, "version": suite.version }),
        )?;
        Ok(suite)
    }

    /// Adds a scenario to an unfrozen DRAFT suite.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::DuplicateScenario`] on identifier reuse
    /// and [`GovernanceError::InvalidStatus`] once the suite is frozen.
    pub fn add_scenario(
        &self,
        suite_id: SuiteId,
        scenario_id: ScenarioId,
        kind: ScenarioKind,
        payload: Value,
        actor: &AuditActor,
    ) -> Result<Scenario, GovernanceError> {
        let suite = self.load_suite(suite_id)?;
        if suite.is_frozen || suite.status != SuiteStatus::Draft {
            return Err(GovernanceError::InvalidStatus {
                current_status: suite.status,
                action_required: "create a new suite version to change scenarios".to_string(),
            });
        }
        let existing = self.store.scenarios(suite_id)?;
        if existing.iter().any(|scenario| scenario.scenario_id == scenario_id) {
            return Err(GovernanceError::DuplicateScenario(scenario_id));
        }
        let sequence_order =
            u32::try_from(existing.len()).unwrap_or(u32::MAX).saturating_add(1);
        let scenario = Scenario {
            scenario_id,
            suite_id,
            sequence_order,
            kind,
            scenario_hash: hash_canonical_json(&payload)?,
            payload,
        };
        self.store.insert_scenario(scenario.clone())?;
        self.audit_command(
            actor,
            "suite.add_scenario",
            "suite_scenario",
            scenario.scenario_id.to_string(),
            true,
            json!({ "suite_id": suite_id.to_string(), "sequence_order": sequence_order }),
        )?;
        Ok(scenario)
    }

    /// Freezes a DRAFT suite, pinning the scenario manifest.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidStatus`] outside DRAFT and
    /// [`GovernanceError::Invalid`] for an empty suite.
    pub fn freeze(&self, suite_id: SuiteId, actor: &AuditActor) -> Result<Suite, GovernanceError> {
        let mut suite = self.load_suite(suite_id)?;
        if suite.status != SuiteStatus::Draft || suite.is_frozen {
            return Err(GovernanceError::InvalidStatus {
                current_status: suite.status,
                action_required: "only an unfrozen DRAFT suite can be frozen".to_string(),
            });
        }
        let scenarios = self.store.scenarios(suite_id)?;
        if scenarios.is_empty() {
            return Err(GovernanceError::Invalid("cannot freeze an empty suite".to_string()));
        }
        suite.is_frozen = true;
        suite.scenario_count = u32::try_from(scenarios.len()).unwrap_or(u32::MAX);
        suite.scenario_manifest_hash = Some(scenario_manifest_hash(&scenarios)?);
        self.store.update_suite(suite.clone())?;
        self.audit_command(
            actor,
            "suite.freeze",
            "suite",
            suite_id.to_string(),
            true,
            json!({ "scenario_count": suite.scenario_count }),
        )?;
        Ok(suite)
    }

    /// Clones a suite's scenarios into a new DRAFT version.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::NotFound`] when the source suite is
    /// missing.
    pub fn create_version(
        &self,
        source_suite_id: SuiteId,
        actor: &AuditActor,
    ) -> Result<Suite, GovernanceError> {
        let source = self.load_suite(source_suite_id)?;
        let clone = self.create_suite(&source.base_suite_key, actor)?;
        for scenario in self.store.scenarios(source_suite_id)? {
            self.store.insert_scenario(Scenario {
                suite_id: clone.suite_id,
                ..scenario
            })?;
        }
        self.audit_command(
            actor,
            "suite.create_version",
            "suite",
            clone.suite_id.to_string(),
            true,
            json!({
                "cloned_from": source_suite_id.to_string(),
                "base_suite_key": clone.base_suite_key,
                "version": clone.version,
            }),
        )?;
        Ok(clone)
    }

    /// Approves a HUMAN_VALIDATED suite for GA.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Forbidden`] without the
    /// `CALIBRATION_ADMIN` role and [`GovernanceError::InvalidStatus`]
    /// outside HUMAN_VALIDATED.
    pub fn approve_for_ga(
        &self,
        suite_id: SuiteId,
        actor: &AuditActor,
        role: GovernanceRole,
    ) -> Result<Suite, GovernanceError> {
        if role != GovernanceRole::CalibrationAdmin {
            return Err(GovernanceError::Forbidden {
                required: GovernanceRole::CalibrationAdmin,
            });
        }
        let mut suite = self.load_suite(suite_id)?;
        if suite.status != SuiteStatus::HumanValidated {
            return Err(GovernanceError::InvalidStatus {
                current_status: suite.status,
                action_required: "complete human calibration before GA approval".to_string(),
            });
        }
        suite.status = SuiteStatus::GaApproved;
        self.store.update_suite(suite.clone())?;
        self.audit_command(
            actor,
            "suite.approve_for_ga",
            "suite",
            suite_id.to_string(),
            true,
            json!({}),
        )?;
        Ok(suite)
    }

    /// Deprecates a suite from any status.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::NotFound`] when the suite is missing.
    pub fn deprecate(
        &self,
        suite_id: SuiteId,
        reason: &str,
        actor: &AuditActor,
    ) -> Result<Suite, GovernanceError> {
        let mut suite = self.load_suite(suite_id)?;
        suite.status = SuiteStatus::Deprecated;
        suite.deprecated_reason = Some(reason.to_string());
        self.store.update_suite(suite.clone())?;
        self.audit_command(
            actor,
            "suite.deprecate",
            "suite",
            suite_id.to_string(),
            true,
            json!({ "reason": reason }),
        )?;
        Ok(suite)
    }

    // ------------------------------------------------------------------
    // System validation
    // ------------------------------------------------------------------

    /// Runs system validation over a frozen DRAFT suite.
    ///
    /// Scenarios are iterated in `sequence_order`; scoring fans out over a
    /// bounded worker pool while the commit is one atomic unit. The suite is
    /// promoted to SYSTEM_VALIDATED only when the finished aggregates meet
    /// both thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::SuiteNotFrozen`] for an unfrozen suite and
    /// [`GovernanceError::InvalidStatus`] outside DRAFT.
    pub fn run_system_validation(
        &self,
        suite_id: SuiteId,
        params: RunParams,
        scorer: &dyn ScenarioScorer,
        actor: &AuditActor,
    ) -> Result<(ValidationRun, Suite), GovernanceError> {
        let mut suite = self.load_suite(suite_id)?;
        if !suite.is_frozen {
            return Err(GovernanceError::SuiteNotFrozen(suite_id));
        }
        if suite.status != SuiteStatus::Draft {
            return Err(GovernanceError::InvalidStatus {
                current_status: suite.status,
                action_required: "system validation runs against a frozen DRAFT suite"
                    .to_string(),
            });
        }
        let manifest_hash =
            suite.scenario_manifest_hash.clone().ok_or_else(|| {
                GovernanceError::Invalid("frozen suite is missing its manifest hash".to_string())
            })?;
        let scenarios = self.store.scenarios(suite_id)?;

        let mut run = ValidationRun {
            run_id: RunId::new(self.ids.next_id()),
            suite_id,
            run_number: self.store.next_run_number(suite_id)?,
            scenario_manifest_hash: manifest_hash,
            siva_version: params.siva_version.clone(),
            code_commit_sha: params.code_commit_sha.clone(),
            environment: params.environment.clone(),
            persona_id: params.persona_id,
            status: RunStatus::Running,
            golden_pass_rate: None,
            kill_containment_rate: None,
            cohens_d: None,
            failure_reason: None,
            started_at: self.clock.now(),
            ended_at: None,
        };
        self.store.insert_run(run.clone())?;

        let scored = score_with_fan_out(&scenarios, params.persona_id, params.fan_out, scorer);
        let mut results: Vec<ScenarioResult> = Vec::with_capacity(scenarios.len());
        let mut failure: Option<String> = None;
        for (scenario, outcome) in scenarios.iter().zip(scored.into_iter()) {
            match outcome {
                Some(Ok(scored)) => results.push(ScenarioResult {
                    run_id: run.run_id,
                    scenario_id: scenario.scenario_id.clone(),
                    sequence_order: scenario.sequence_order,
                    kind: scenario.kind,
                    outcome: scored.outcome,
                    dimensions: scored.dimensions,
                    weighted_crs: scored.dimensions.weighted_crs(),
                    latency_ms: scored.latency_ms,
                }),
                Some(Err(err)) => {
                    failure.get_or_insert(err.to_string());
                }
                None => {
                    failure.get_or_insert("scenario scoring did not finish".to_string());
                }
            }
        }
        results.sort_by_key(|result| result.sequence_order);

        run.ended_at = Some(self.clock.now());
        if let Some(reason) = failure {
            run.status = RunStatus::Failed;
            run.failure_reason = Some(reason);
        } else {
            run.status = RunStatus::Completed;
            let (golden_pass, kill_containment, effect) = aggregate_results(&results);
            run.golden_pass_rate = Some(golden_pass);
            run.kill_containment_rate = Some(kill_containment);
            run.cohens_d = effect;
        }
        self.store.commit_run(run.clone(), results)?;

        let promoted = run.meets_promotion_gate();
        if promoted {
            suite.status = SuiteStatus::SystemValidated;
            self.store.update_suite(suite.clone())?;
        }
        self.audit_command(
            actor,
            "suite.run_system_validation",
            "run",
            run.run_id.to_string(),
            run.status == RunStatus::Completed,
            json!({
                "suite_id": suite_id.to_string(),
                "run_number": run.run_number,
                "promoted": promoted,
            }),
        )?;
        Ok((run, suite))
    }

    // ------------------------------------------------------------------
    // Human calibration
    // ------------------------------------------------------------------

    /// Starts a calibration session with one invite per evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidStatus`] outside SYSTEM_VALIDATED
    /// and [`GovernanceError::TooFewEvaluators`] below two evaluators.
    pub fn start_human_calibration(
        &self,
        suite_id: SuiteId,
        evaluator_emails: &[String],
        deadline: Timestamp,
        actor: &AuditActor,
    ) -> Result<(CalibrationSession, Vec<EvaluatorInvite>), GovernanceError> {
        let suite = self.load_suite(suite_id)?;
        if suite.status != SuiteStatus::SystemValidated {
            return Err(GovernanceError::InvalidStatus {
                current_status: suite.status,
                action_required: "run system validation before human calibration".to_string(),
            });
        }
        if evaluator_emails.len() < MIN_EVALUATORS {
            return Err(GovernanceError::TooFewEvaluators {
                provided: evaluator_emails.len(),
                required: MIN_EVALUATORS,
            });
        }
        let baseline = self.store.latest_completed_run(suite_id)?.ok_or_else(|| {
            GovernanceError::Invalid("no completed validation run to calibrate against".to_string())
        })?;
        let scenarios = self.store.scenarios(suite_id)?;

        let session = CalibrationSession {
            session_id: SessionId::new(self.ids.next_id()),
            suite_id,
            run_id: baseline.run_id,
            deadline,
            status: SessionStatus::InProgress,
            spearman_rho: None,
            icc: None,
            created_at: self.clock.now(),
            completed_at: None,
        };
        self.store.insert_session(session.clone())?;

        let mut invites = Vec::with_capacity(evaluator_emails.len());
        for (index, email) in evaluator_emails.iter().enumerate() {
            let evaluator_index = u32::try_from(index).unwrap_or(u32::MAX);
            let invite = EvaluatorInvite {
                invite_id: InviteId::new(self.ids.next_id()),
                session_id: session.session_id,
                evaluator_email: email.clone(),
                evaluator_index,
                token: self.tokens.next_token(),
                expires_at: deadline.saturating_add_days(1),
                status: InviteStatus::Pending,
                first_accessed_at: None,
                first_user_agent: None,
                first_ip: None,
            };
            self.store.insert_invite(invite.clone())?;
            let queue: Vec<ScenarioId> = seeded_shuffle(evaluator_index, scenarios.len())
                .into_iter()
                .map(|position| scenarios[position].scenario_id.clone())
                .collect();
            self.store.set_queue(invite.invite_id, queue)?;
            invites.push(invite);
        }
        self.audit_command(
            actor,
            "suite.start_human_calibration",
            "calibration_session",
            session.session_id.to_string(),
            true,
            json!({ "suite_id": suite_id.to_string(), "evaluators": invites.len() }),
        )?;
        Ok((session, invites))
    }

    /// Resolves an invite token, pinning first-access metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::TokenExpired`] past `expires_at` and
    /// [`GovernanceError::NotFound`] for unknown tokens.
    pub fn access_invite(
        &self,
        token: &str,
        user_agent: &str,
        ip: &str,
    ) -> Result<(EvaluatorInvite, Vec<ScenarioId>), GovernanceError> {
        let now = self.clock.now();
        let mut invite =
            self.store.invite_by_token(token)?.ok_or(GovernanceError::NotFound {
                kind: "evaluator_invite",
                id: "token".to_string(),
            })?;
        if invite.expires_at.is_before(now) {
            return Err(GovernanceError::TokenExpired);
        }
        if invite.first_accessed_at.is_none() {
            invite.first_accessed_at = Some(now);
            invite.first_user_agent = Some(user_agent.to_string());
            invite.first_ip = Some(ip.to_string());
            self.store.update_invite(invite.clone())?;
        }
        let queue = self.store.queue_for(invite.invite_id)?;
        Ok((invite, queue))
    }

    /// Records one evaluator score; completes the invite on full coverage.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Invalid`] for out-of-range scores,
    /// unknown queue scenarios, or duplicate submissions.
    pub fn submit_score(
        &self,
        invite_id: InviteId,
        submission: ScoreSubmission,
    ) -> Result<HumanScore, GovernanceError> {
        let now = self.clock.now();
        let mut invite = self.store.invite(invite_id)?.ok_or(GovernanceError::NotFound {
            kind: "evaluator_invite",
            id: invite_id.to_string(),
        })?;
        if invite.status != InviteStatus::Pending {
            return Err(GovernanceError::Invalid("invite already completed".to_string()));
        }
        if invite.expires_at.is_before(now) {
            return Err(GovernanceError::TokenExpired);
        }
        if !submission.dimensions.is_valid() {
            return Err(GovernanceError::Invalid(
                "dimension scores must lie in [1, 5]".to_string(),
            ));
        }
        if !(1 ..= 5).contains(&submission.confidence) {
            return Err(GovernanceError::Invalid("confidence must lie in [1, 5]".to_string()));
        }
        let queue = self.store.queue_for(invite_id)?;
        if !queue.contains(&submission.scenario_id) {
            return Err(GovernanceError::Invalid(format!(
                "scenario {} is not in this evaluator's queue",
                submission.scenario_id
            )));
        }
        let already_scored = self
            .store
            .scores_for_invite(invite_id)?
            .iter()
            .any(|score| score.scenario_id == submission.scenario_id);
        if already_scored {
            return Err(GovernanceError::Invalid(format!(
                "scenario {} already scored by this evaluator",
                submission.scenario_id
            )));
        }

        let score = HumanScore {
            invite_id,
            scenario_id: submission.scenario_id,
            dimensions: submission.dimensions,
            would_pursue: submission.would_pursue,
            confidence: submission.confidence,
            submitted_at: now,
        };
        self.store.insert_score(score.clone())?;

        let scored_count = self.store.scores_for_invite(invite_id)?.len();
        if scored_count == queue.len() {
            invite.status = InviteStatus::Completed;
            self.store.update_invite(invite)?;
        }
        Ok(score)
    }

    /// Completes a session once every invite finished, gating on rho.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Invalid`] while invites are outstanding
    /// and [`GovernanceError::CorrelationTooLow`] below the gate (the
    /// session is marked failed, the suite is not promoted).
    pub fn complete_session(
        &self,
        session_id: SessionId,
        actor: &AuditActor,
    ) -> Result<CalibrationSession, GovernanceError> {
        let mut session =
            self.store.session(session_id)?.ok_or(GovernanceError::NotFound {
                kind: "calibration_session",
                id: session_id.to_string(),
            })?;
        if session.status != SessionStatus::InProgress {
            return Err(GovernanceError::Invalid(
                "calibration session already finished".to_string(),
            ));
        }
        let invites = self.store.invites_for(session_id)?;
        let outstanding =
            invites.iter().filter(|invite| invite.status != InviteStatus::Completed).count();
        if outstanding > 0 || invites.len() < MIN_EVALUATORS {
            return Err(GovernanceError::Invalid(format!(
                "{outstanding} invites outstanding; all evaluators must complete"
            )));
        }

        let machine = self.store.run_results(session.run_id)?;
        let scores = self.store.scores_for_session(session_id)?;
        let per_invite: BTreeMap<InviteId, BTreeMap<&ScenarioId, f64>> =
            invites
                .iter()
                .map(|invite| {
                    let by_scenario = scores
                        .iter()
                        .filter(|score| score.invite_id == invite.invite_id)
                        .map(|score| (&score.scenario_id, score.dimensions.weighted_crs()))
                        .collect();
                    (invite.invite_id, by_scenario)
                })
                .collect();

        let mut machine_crs: Vec<f64> = Vec::with_capacity(machine.len());
        let mut human_crs: Vec<f64> = Vec::with_capacity(machine.len());
        let mut agreement_matrix: Vec<Vec<f64>> = Vec::with_capacity(machine.len());
        for result in &machine {
            let evaluator_scores: Vec<f64> = invites
                .iter()
                .filter_map(|invite| {
                    per_invite
                        .get(&invite.invite_id)
                        .and_then(|by_scenario| by_scenario.get(&result.scenario_id).copied())
                })
                .collect();
            if evaluator_scores.len() != invites.len() {
                return Err(GovernanceError::Invalid(format!(
                    "scenario {} is missing evaluator scores",
                    result.scenario_id
                )));
            }
            let count = u32::try_from(evaluator_scores.len()).unwrap_or(u32::MAX);
            machine_crs.push(result.weighted_crs);
            human_crs.push(evaluator_scores.iter().sum::<f64>() / f64::from(count));
            agreement_matrix.push(evaluator_scores);
        }

        let rho = spearman_rho(&machine_crs, &human_crs).unwrap_or(0.0);
        session.spearman_rho = Some(rho);
        session.icc = icc2_1(&agreement_matrix);
        session.completed_at = Some(self.clock.now());

        if rho >= CORRELATION_THRESHOLD {
            session.status = SessionStatus::Completed;
            self.store.update_session(session.clone())?;
            let mut suite = self.load_suite(session.suite_id)?;
            if suite.status == SuiteStatus::SystemValidated {
                suite.status = SuiteStatus::HumanValidated;
                self.store.update_suite(suite)?;
            }
            self.audit_command(
                actor,
                "suite.complete_calibration",
                "calibration_session",
                session_id.to_string(),
                true,
                json!({ "spearman_rho": rho }),
            )?;
            Ok(session)
        } else {
            session.status = SessionStatus::Failed;
            self.store.update_session(session)?;
            self.audit_command(
                actor,
                "suite.complete_calibration",
                "calibration_session",
                session_id.to_string(),
                false,
                json!({ "spearman_rho": rho }),
            )?;
            Err(GovernanceError::CorrelationTooLow {
                rho,
                required: CORRELATION_THRESHOLD,
            })
        }
    }
}

// ============================================================================
// SECTION: Bounded Scoring Pool
// ============================================================================

/// Scores scenarios across a bounded worker pool.
///
/// Workers pull indexes from a shared counter; output slots are positional
/// so the result order is independent of completion order.
fn score_with_fan_out(
    scenarios: &[Scenario],
    persona_id: PersonaId,
    fan_out: usize,
    scorer: &dyn ScenarioScorer,
) -> Vec<Option<Result<ScoredScenario, ScorerError>>> {
    let worker_count = fan_out.max(1).min(scenarios.len().max(1));
    let next_index = AtomicUsize::new(0);
    let slots: Vec<std::sync::Mutex<Option<Result<ScoredScenario, ScorerError>>>> =
        scenarios.iter().map(|_| std::sync::Mutex::new(None)).collect();

    std::thread::scope(|scope| {
        for _ in 0 .. worker_count {
            scope.spawn(|| {
                loop {
                    let index = next_index.fetch_add(1, Ordering::Relaxed);
                    let Some(scenario) = scenarios.get(index) else {
                        break;
                    };
                    let scored = scorer.score(scenario, persona_id);
                    if let Ok(mut slot) = slots[index].lock() {
                        *slot = Some(scored);
                    }
                }
            });
        }
    });

    slots
        .into_iter()
        .map(|slot| slot.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner))
        .collect()
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// Computes golden pass rate, kill containment rate, and Cohen's d.
fn aggregate_results(results: &[ScenarioResult]) -> (f64, f64, Option<f64>) {
    let golden: Vec<&ScenarioResult> =
        results.iter().filter(|result| result.kind == ScenarioKind::Golden).collect();
    let kill: Vec<&ScenarioResult> =
        results.iter().filter(|result| result.kind == ScenarioKind::Kill).collect();

    let golden_pass = rate(
        golden.iter().filter(|result| result.outcome == ScenarioOutcome::Pass).count(),
        golden.len(),
    );
    let kill_containment = rate(
        kill.iter().filter(|result| result.outcome == ScenarioOutcome::Block).count(),
        kill.len(),
    );
    let golden_crs: Vec<f64> = golden.iter().map(|result| result.weighted_crs).collect();
    let kill_crs: Vec<f64> = kill.iter().map(|result| result.weighted_crs).collect();
    (golden_pass, kill_containment, cohens_d(&golden_crs, &kill_crs))
}

/// Safe ratio; zero denominators yield zero.
fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let numerator = u32::try_from(numerator).unwrap_or(u32::MAX);
    let denominator = u32::try_from(denominator).unwrap_or(u32::MAX);
    f64::from(numerator) / f64::from(denominator)
}
