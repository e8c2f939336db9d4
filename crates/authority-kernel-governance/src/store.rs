// crates/authority-kernel-governance/src/store.rs
// ============================================================================
// Module: Governance Store Interface
// Description: Backend-agnostic storage contract for suite governance.
// Purpose: Persist suites, runs, calibration sessions, and business events.
// Dependencies: authority-kernel-core, crate::{calibration, suite, validation}
// ============================================================================

//! ## Overview
//! The governance store persists the suite lifecycle alongside runs and
//! calibration state. Run commits are atomic: per-scenario rows land in one
//! unit with the run-state update. Business events are the immutable event
//! log governance references; the contract offers append and read only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use authority_kernel_core::InviteId;
use authority_kernel_core::RunId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SessionId;
use authority_kernel_core::StoreError;
use authority_kernel_core::SuiteId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::calibration::CalibrationSession;
use crate::calibration::EvaluatorInvite;
use crate::calibration::HumanScore;
use crate::suite::Scenario;
use crate::suite::Suite;
use crate::validation::RunStatus;
use crate::validation::ScenarioResult;
use crate::validation::ValidationRun;

// ============================================================================
// SECTION: Business Events
// ============================================================================

/// One entry of the immutable business-event log.
///
/// # Invariants
/// - Entries are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessEvent {
    /// Event kind label.
    pub kind: String,
    /// Structured event payload.
    pub payload: Value,
    /// Instant the event occurred.
    pub occurred_at: Timestamp,
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

/// Backend-agnostic governance persistence.
///
/// # Invariants
/// - `commit_run` applies the run update and its result rows atomically.
/// - `next_run_number` is strictly increasing per suite, starting at 1.
/// - Business events are append-only; the contract exposes no mutation.
pub trait GovernanceStore {
    /// Inserts a suite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_suite(&self, suite: Suite) -> Result<(), StoreError>;

    /// Loads a suite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn suite(&self, suite_id: SuiteId) -> Result<Option<Suite>, StoreError>;

    /// Replaces a suite record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the suite does not exist.
    fn update_suite(&self, suite: Suite) -> Result<(), StoreError>;

    /// Lists every suite ordered by lineage key, then version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn suites(&self) -> Result<Vec<Suite>, StoreError>;

    /// Returns the highest version recorded for a lineage key (0 when none).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn latest_version(&self, base_suite_key: &SuiteKey) -> Result<u32, StoreError>;

    /// Inserts a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_scenario(&self, scenario: Scenario) -> Result<(), StoreError>;

    /// Lists a suite's scenarios ordered by `sequence_order`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn scenarios(&self, suite_id: SuiteId) -> Result<Vec<Scenario>, StoreError>;

    /// Returns the next per-suite run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn next_run_number(&self, suite_id: SuiteId) -> Result<u32, StoreError>;

    /// Inserts a run in its initial state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_run(&self, run: ValidationRun) -> Result<(), StoreError>;

    /// Commits a finished run with its result rows atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the run does not exist.
    fn commit_run(
        &self,
        run: ValidationRun,
        results: Vec<ScenarioResult>,
    ) -> Result<(), StoreError>;

    /// Loads a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn run(&self, run_id: RunId) -> Result<Option<ValidationRun>, StoreError>;

    /// Lists runs for a suite ordered by run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn runs_for(&self, suite_id: SuiteId) -> Result<Vec<ValidationRun>, StoreError>;

    /// Returns the latest completed run for a suite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn latest_completed_run(&self, suite_id: SuiteId)
    -> Result<Option<ValidationRun>, StoreError>;

    /// Lists result rows for a run ordered by `sequence_order`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn run_results(&self, run_id: RunId) -> Result<Vec<ScenarioResult>, StoreError>;

    /// Fails runs still `RUNNING` that started at or before `cutoff`.
    ///
    /// Returns the number of runs transitioned. Keeps the no-indefinite-
    /// `RUNNING` guarantee when a scoring host dies mid-run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn sweep_stale_runs(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError>;

    /// Inserts a calibration session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_session(&self, session: CalibrationSession) -> Result<(), StoreError>;

    /// Loads a calibration session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn session(&self, session_id: SessionId) -> Result<Option<CalibrationSession>, StoreError>;

    /// Replaces a calibration session record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the session does not exist.
    fn update_session(&self, session: CalibrationSession) -> Result<(), StoreError>;

    /// Inserts an evaluator invite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError>;

    /// Loads an invite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn invite(&self, invite_id: InviteId) -> Result<Option<EvaluatorInvite>, StoreError>;

    /// Loads an invite by its access token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn invite_by_token(&self, token: &str) -> Result<Option<EvaluatorInvite>, StoreError>;

    /// Lists invites for a session ordered by evaluator index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn invites_for(&self, session_id: SessionId) -> Result<Vec<EvaluatorInvite>, StoreError>;

    /// Replaces an invite record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the invite does not exist.
    fn update_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError>;

    /// Stores the deterministic scenario queue of an invite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn set_queue(&self, invite_id: InviteId, queue: Vec<ScenarioId>) -> Result<(), StoreError>;

    /// Loads the scenario queue of an invite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn queue_for(&self, invite_id: InviteId) -> Result<Vec<ScenarioId>, StoreError>;

    /// Appends a human score.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn insert_score(&self, score: HumanScore) -> Result<(), StoreError>;

    /// Lists scores submitted through an invite.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn scores_for_invite(&self, invite_id: InviteId) -> Result<Vec<HumanScore>, StoreError>;

    /// Lists every score of a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn scores_for_session(&self, session_id: SessionId) -> Result<Vec<HumanScore>, StoreError>;

    /// Appends a business event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn append_business_event(&self, event: BusinessEvent) -> Result<(), StoreError>;

    /// Lists business events in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on infrastructure failure.
    fn business_events(&self) -> Result<Vec<BusinessEvent>, StoreError>;
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable state behind the in-memory governance store.
#[derive(Debug, Default)]
struct GovernanceState {
    /// Suites keyed by identifier.
    suites: BTreeMap<SuiteId, Suite>,
    /// Scenarios keyed by suite.
    scenarios: BTreeMap<SuiteId, Vec<Scenario>>,
    /// Runs keyed by identifier.
    runs: BTreeMap<RunId, ValidationRun>,
    /// Result rows keyed by run.
    results: BTreeMap<RunId, Vec<ScenarioResult>>,
    /// Sessions keyed by identifier.
    sessions: BTreeMap<SessionId, CalibrationSession>,
    /// Invites keyed by identifier.
    invites: BTreeMap<InviteId, EvaluatorInvite>,
    /// Scenario queues keyed by invite.
    queues: BTreeMap<InviteId, Vec<ScenarioId>>,
    /// Human scores in submission order.
    scores: Vec<HumanScore>,
    /// Business events in append order.
    events: Vec<BusinessEvent>,
}

/// In-memory governance store for tests and demos.
#[derive(Clone, Default)]
pub struct InMemoryGovernanceStore {
    /// Guarded store state.
    state: Arc<Mutex<GovernanceState>>,
}

impl InMemoryGovernanceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, mapping poisoning onto a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, GovernanceState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("governance store mutex poisoned".to_string()))
    }
}

impl GovernanceStore for InMemoryGovernanceStore {
    fn insert_suite(&self, suite: Suite) -> Result<(), StoreError> {
        self.lock()?.suites.insert(suite.suite_id, suite);
        Ok(())
    }

    fn suite(&self, suite_id: SuiteId) -> Result<Option<Suite>, StoreError> {
        Ok(self.lock()?.suites.get(&suite_id).cloned())
    }

    fn update_suite(&self, suite: Suite) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.suites.contains_key(&suite.suite_id) {
            return Err(StoreError::Invalid(format!("suite not found: {}", suite.suite_id)));
        }
        state.suites.insert(suite.suite_id, suite);
        Ok(())
    }

    fn suites(&self) -> Result<Vec<Suite>, StoreError> {
        let state = self.lock()?;
        let mut suites: Vec<Suite> = state.suites.values().cloned().collect();
        suites.sort_by(|a, b| {
            (&a.base_suite_key, a.version).cmp(&(&b.base_suite_key, b.version))
        });
        Ok(suites)
    }

    fn latest_version(&self, base_suite_key: &SuiteKey) -> Result<u32, StoreError> {
        Ok(self
            .lock()?
            .suites
            .values()
            .filter(|suite| &suite.base_suite_key == base_suite_key)
            .map(|suite| suite.version)
            .max()
            .unwrap_or(0))
    }

    fn insert_scenario(&self, scenario: Scenario) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let entry = state.scenarios.entry(scenario.suite_id).or_default();
        entry.push(scenario);
        entry.sort_by_key(|scenario| scenario.sequence_order);
        Ok(())
    }

    fn scenarios(&self, suite_id: SuiteId) -> Result<Vec<Scenario>, StoreError> {
        Ok(self.lock()?.scenarios.get(&suite_id).cloned().unwrap_or_default())
    }

    fn next_run_number(&self, suite_id: SuiteId) -> Result<u32, StoreError> {
        Ok(self
            .lock()?
            .runs
            .values()
            .filter(|run| run.suite_id == suite_id)
            .map(|run| run.run_number)
            .max()
            .unwrap_or(0)
            .saturating_add(1))
    }

    fn insert_run(&self, run: ValidationRun) -> Result<(), StoreError> {
        self.lock()?.runs.insert(run.run_id, run);
        Ok(())
    }

    fn commit_run(
        &self,
        run: ValidationRun,
        results: Vec<ScenarioResult>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.runs.contains_key(&run.run_id) {
            return Err(StoreError::Invalid(format!("run not found: {}", run.run_id)));
        }
        state.results.insert(run.run_id, results);
        state.runs.insert(run.run_id, run);
        Ok(())
    }

    fn run(&self, run_id: RunId) -> Result<Option<ValidationRun>, StoreError> {
        Ok(self.lock()?.runs.get(&run_id).cloned())
    }

    fn runs_for(&self, suite_id: SuiteId) -> Result<Vec<ValidationRun>, StoreError> {
        let state = self.lock()?;
        let mut runs: Vec<ValidationRun> =
            state.runs.values().filter(|run| run.suite_id == suite_id).cloned().collect();
        runs.sort_by_key(|run| run.run_number);
        Ok(runs)
    }

    fn latest_completed_run(
        &self,
        suite_id: SuiteId,
    ) -> Result<Option<ValidationRun>, StoreError> {
        Ok(self
            .runs_for(suite_id)?
            .into_iter()
            .filter(|run| run.status == RunStatus::Completed)
            .max_by_key(|run| run.run_number))
    }

    fn run_results(&self, run_id: RunId) -> Result<Vec<ScenarioResult>, StoreError> {
        let mut results = self.lock()?.results.get(&run_id).cloned().unwrap_or_default();
        results.sort_by_key(|result| result.sequence_order);
        Ok(results)
    }

    fn sweep_stale_runs(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let mut transitioned = 0u64;
        for run in state.runs.values_mut() {
            if run.status == RunStatus::Running && !cutoff.is_before(run.started_at) {
                run.status = RunStatus::Failed;
                run.failure_reason = Some("RUN_TIMEOUT".to_string());
                run.ended_at = Some(now);
                transitioned = transitioned.saturating_add(1);
            }
        }
        Ok(transitioned)
    }

    fn insert_session(&self, session: CalibrationSession) -> Result<(), StoreError> {
        self.lock()?.sessions.insert(session.session_id, session);
        Ok(())
    }

    fn session(&self, session_id: SessionId) -> Result<Option<CalibrationSession>, StoreError> {
        Ok(self.lock()?.sessions.get(&session_id).cloned())
    }

    fn update_session(&self, session: CalibrationSession) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.sessions.contains_key(&session.session_id) {
            return Err(StoreError::Invalid(format!("session not found: {}", session.session_id)));
        }
        state.sessions.insert(session.session_id, session);
        Ok(())
    }

    fn insert_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError> {
        self.lock()?.invites.insert(invite.invite_id, invite);
        Ok(())
    }

    fn invite(&self, invite_id: InviteId) -> Result<Option<EvaluatorInvite>, StoreError> {
        Ok(self.lock()?.invites.get(&invite_id).cloned())
    }

    fn invite_by_token(&self, token: &str) -> Result<Option<EvaluatorInvite>, StoreError> {
        Ok(self.lock()?.invites.values().find(|invite| invite.token == token).cloned())
    }

    fn invites_for(&self, session_id: SessionId) -> Result<Vec<EvaluatorInvite>, StoreError> {
        let state = self.lock()?;
        let mut invites: Vec<EvaluatorInvite> = state
            .invites
            .values()
            .filter(|invite| invite.session_id == session_id)
            .cloned()
            .collect();
        invites.sort_by_key(|invite| invite.evaluator_index);
        Ok(invites)
    }

    fn update_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.invites.contains_key(&invite.invite_id) {
            return Err(StoreError::Invalid(format!("invite not found: {}", invite.invite_id)));
        }
        state.invites.insert(invite.invite_id, invite);
        Ok(())
    }

    fn set_queue(&self, invite_id: InviteId, queue: Vec<ScenarioId>) -> Result<(), StoreError> {
        self.lock()?.queues.insert(invite_id, queue);
        Ok(())
    }

    fn queue_for(&self, invite_id: InviteId) -> Result<Vec<ScenarioId>, StoreError> {
        Ok(self.lock()?.queues.get(&invite_id).cloned().unwrap_or_default())
    }

    fn insert_score(&self, score: HumanScore) -> Result<(), StoreError> {
        self.lock()?.scores.push(score);
        Ok(())
    }

    fn scores_for_invite(&self, invite_id: InviteId) -> Result<Vec<HumanScore>, StoreError> {
        Ok(self
            .lock()?
            .scores
            .iter()
            .filter(|score| score.invite_id == invite_id)
            .cloned()
            .collect())
    }

    fn scores_for_session(&self, session_id: SessionId) -> Result<Vec<HumanScore>, StoreError> {
        let state = self.lock()?;
        let invite_ids: Vec<InviteId> = state
            .invites
            .values()
            .filter(|invite| invite.session_id == session_id)
            .map(|invite| invite.invite_id)
            .collect();
        Ok(state
            .scores
            .iter()
            .filter(|score| invite_ids.contains(&score.invite_id))
            .cloned()
            .collect())
    }

    fn append_business_event(&self, event: BusinessEvent) -> Result<(), StoreError> {
        self.lock()?.events.push(event);
        Ok(())
    }

    fn business_events(&self) -> Result<Vec<BusinessEvent>, StoreError> {
        Ok(self.lock()?.events.clone())
    }
}
