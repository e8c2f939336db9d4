// crates/authority-kernel-store-sqlite/src/governance.rs
// ============================================================================
// Module: SQLite Governance Store
// Description: Durable suites, runs, calibration sessions, and business events.
// Purpose: Persist the suite lifecycle with atomic run commits.
// Dependencies: authority-kernel-core, authority-kernel-governance, rusqlite,
// crate::store
// ============================================================================

//! ## Overview
//! Run commits apply the run-state update and every per-scenario result row
//! in one transaction, committed in `sequence_order`. `run_number`
//! uniqueness is backed by a `(suite_id, run_number)` unique constraint, and
//! business events carry the same append-only trigger guard as audit rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::InviteId;
use authority_kernel_core::RunId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SessionId;
use authority_kernel_core::StoreError;
use authority_kernel_core::SuiteId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Timestamp;
use authority_kernel_governance::BusinessEvent;
use authority_kernel_governance::CalibrationSession;
use authority_kernel_governance::EvaluatorInvite;
use authority_kernel_governance::GovernanceStore;
use authority_kernel_governance::HumanScore;
use authority_kernel_governance::RunStatus;
use authority_kernel_governance::Scenario;
use authority_kernel_governance::ScenarioResult;
use authority_kernel_governance::Suite;
use authority_kernel_governance::ValidationRun;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::store::SqliteKernelStore;
use crate::store::SqliteStoreError;
use crate::store::from_record_json;
use crate::store::to_record_json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a SQLite error onto the generic store error channel.
fn store_err(error: SqliteStoreError) -> StoreError {
    StoreError::from(error)
}

/// Returns the stored status label for a run status.
const fn run_status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "RUNNING",
        RunStatus::Completed => "COMPLETED",
        RunStatus::Failed => "FAILED",
    }
}

// ============================================================================
// SECTION: Governance Store Implementation
// ============================================================================

impl GovernanceStore for SqliteKernelStore {
    fn insert_suite(&self, suite: Suite) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO suites (suite_id, base_suite_key, version, record_json) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    suite.suite_id.to_string(),
                    suite.base_suite_key.as_str(),
                    suite.version,
                    to_record_json(&suite).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn suite(&self, suite_id: SuiteId) -> Result<Option<Suite>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM suites WHERE suite_id = ?1",
                params![suite_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn update_suite(&self, suite: Suite) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let changed = guard
            .execute(
                "UPDATE suites SET record_json = ?1 WHERE suite_id = ?2",
                params![to_record_json(&suite).map_err(store_err)?, suite.suite_id.to_string()],
            )
            .map_err(|err| store_err(err.into()))?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!("suite not found: {}", suite.suite_id)));
        }
        Ok(())
    }

    fn suites(&self) -> Result<Vec<Suite>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare("SELECT record_json FROM suites ORDER BY base_suite_key ASC, version ASC")
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut suites = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            suites.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(suites)
    }

    fn latest_version(&self, base_suite_key: &SuiteKey) -> Result<u32, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let version: Option<i64> = guard
            .query_row(
                "SELECT MAX(version) FROM suites WHERE base_suite_key = ?1",
                params![base_suite_key.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(version.and_then(|raw| u32::try_from(raw).ok()).unwrap_or(0))
    }

    fn insert_scenario(&self, scenario: Scenario) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO suite_scenarios (suite_id, scenario_id, sequence_order, \
                 record_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    scenario.suite_id.to_string(),
                    scenario.scenario_id.as_str(),
                    scenario.sequence_order,
                    to_record_json(&scenario).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn scenarios(&self, suite_id: SuiteId) -> Result<Vec<Scenario>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM suite_scenarios WHERE suite_id = ?1 \
                 ORDER BY sequence_order ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![suite_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut scenarios = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            scenarios.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(scenarios)
    }

    fn next_run_number(&self, suite_id: SuiteId) -> Result<u32, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let highest: Option<i64> = guard
            .query_row(
                "SELECT MAX(run_number) FROM runs WHERE suite_id = ?1",
                params![suite_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(highest.and_then(|raw| u32::try_from(raw).ok()).unwrap_or(0).saturating_add(1))
    }

    fn insert_run(&self, run: ValidationRun) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO runs (run_id, suite_id, run_number, status, record_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run.run_id.to_string(),
                    run.suite_id.to_string(),
                    run.run_number,
                    run_status_label(run.status),
                    to_record_json(&run).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn commit_run(
        &self,
        run: ValidationRun,
        results: Vec<ScenarioResult>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock().map_err(store_err)?;
        let tx = guard.transaction().map_err(|err| store_err(err.into()))?;
        let changed = tx
            .execute(
                "UPDATE runs SET status = ?1, record_json = ?2 WHERE run_id = ?3",
                params![
                    run_status_label(run.status),
                    to_record_json(&run).map_err(store_err)?,
                    run.run_id.to_string()
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!("run not found: {}", run.run_id)));
        }
        for result in &results {
            tx.execute(
                "INSERT OR REPLACE INTO run_results (run_id, scenario_id, sequence_order, \
                 record_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    result.run_id.to_string(),
                    result.scenario_id.as_str(),
                    result.sequence_order,
                    to_record_json(result).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        }
        tx.commit().map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn run(&self, run_id: RunId) -> Result<Option<ValidationRun>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM runs WHERE run_id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn runs_for(&self, suite_id: SuiteId) -> Result<Vec<ValidationRun>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM runs WHERE suite_id = ?1 ORDER BY run_number ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![suite_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut runs = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            runs.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(runs)
    }

    fn latest_completed_run(
        &self,
        suite_id: SuiteId,
    ) -> Result<Option<ValidationRun>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM runs \
                 WHERE suite_id = ?1 AND status = 'COMPLETED' \
                 ORDER BY run_number DESC LIMIT 1",
                params![suite_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn run_results(&self, run_id: RunId) -> Result<Vec<ScenarioResult>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM run_results WHERE run_id = ?1 \
                 ORDER BY sequence_order ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![run_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut results = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            results.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(results)
    }

    fn sweep_stale_runs(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare("SELECT record_json FROM runs WHERE status = 'RUNNING'")
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut stale: Vec<ValidationRun> = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            let run: ValidationRun = from_record_json(&payload).map_err(store_err)?;
            if !cutoff.is_before(run.started_at) {
                stale.push(run);
            }
        }
        drop(stmt);
        let mut transitioned = 0u64;
        for mut run in stale {
            run.status = RunStatus::Failed;
            run.failure_reason = Some("RUN_TIMEOUT".to_string());
            run.ended_at = Some(now);
            let changed = guard
                .execute(
                    "UPDATE runs SET status = 'FAILED', record_json = ?1 \
                     WHERE run_id = ?2 AND status = 'RUNNING'",
                    params![to_record_json(&run).map_err(store_err)?, run.run_id.to_string()],
                )
                .map_err(|err| store_err(err.into()))?;
            transitioned = transitioned.saturating_add(u64::from(changed == 1));
        }
        Ok(transitioned)
    }

    fn insert_session(&self, session: CalibrationSession) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO human_sessions (session_id, suite_id, record_json) \
                 VALUES (?1, ?2, ?3)",
                params![
                    session.session_id.to_string(),
                    session.suite_id.to_string(),
                    to_record_json(&session).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn session(&self, session_id: SessionId) -> Result<Option<CalibrationSession>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM human_sessions WHERE session_id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn update_session(&self, session: CalibrationSession) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let changed = guard
            .execute(
                "UPDATE human_sessions SET record_json = ?1 WHERE session_id = ?2",
                params![
                    to_record_json(&session).map_err(store_err)?,
                    session.session_id.to_string()
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!(
                "session not found: {}",
                session.session_id
            )));
        }
        Ok(())
    }

    fn insert_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO evaluator_invites (invite_id, session_id, evaluator_index, \
                 token, record_json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    invite.invite_id.to_string(),
                    invite.session_id.to_string(),
                    invite.evaluator_index,
                    invite.token,
                    to_record_json(&invite).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn invite(&self, invite_id: InviteId) -> Result<Option<EvaluatorInvite>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM evaluator_invites WHERE invite_id = ?1",
                params![invite_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn invite_by_token(&self, token: &str) -> Result<Option<EvaluatorInvite>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM evaluator_invites WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn invites_for(&self, session_id: SessionId) -> Result<Vec<EvaluatorInvite>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM evaluator_invites WHERE session_id = ?1 \
                 ORDER BY evaluator_index ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut invites = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            invites.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(invites)
    }

    fn update_invite(&self, invite: EvaluatorInvite) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let changed = guard
            .execute(
                "UPDATE evaluator_invites SET record_json = ?1 WHERE invite_id = ?2",
                params![
                    to_record_json(&invite).map_err(store_err)?,
                    invite.invite_id.to_string()
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        if changed == 0 {
            return Err(StoreError::Invalid(format!(
                "invite not found: {}",
                invite.invite_id
            )));
        }
        Ok(())
    }

    fn set_queue(&self, invite_id: InviteId, queue: Vec<ScenarioId>) -> Result<(), StoreError> {
        let mut guard = self.lock().map_err(store_err)?;
        let tx = guard.transaction().map_err(|err| store_err(err.into()))?;
        tx.execute(
            "DELETE FROM evaluator_scenario_queue WHERE invite_id = ?1",
            params![invite_id.to_string()],
        )
        .map_err(|err| store_err(err.into()))?;
        for (position, scenario_id) in queue.iter().enumerate() {
            tx.execute(
                "INSERT INTO evaluator_scenario_queue (invite_id, position, scenario_id) \
                 VALUES (?1, ?2, ?3)",
                params![
                    invite_id.to_string(),
                    u32::try_from(position).unwrap_or(u32::MAX),
                    scenario_id.as_str()
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        }
        tx.commit().map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn queue_for(&self, invite_id: InviteId) -> Result<Vec<ScenarioId>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT scenario_id FROM evaluator_scenario_queue WHERE invite_id = ?1 \
                 ORDER BY position ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![invite_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut queue = Vec::new();
        for row in rows {
            let scenario_id = row.map_err(|err| store_err(err.into()))?;
            queue.push(ScenarioId::new(scenario_id));
        }
        Ok(queue)
    }

    fn insert_score(&self, score: HumanScore) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO human_scores (invite_id, scenario_id, record_json) \
                 VALUES (?1, ?2, ?3)",
                params![
                    score.invite_id.to_string(),
                    score.scenario_id.as_str(),
                    to_record_json(&score).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn scores_for_invite(&self, invite_id: InviteId) -> Result<Vec<HumanScore>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare("SELECT record_json FROM human_scores WHERE invite_id = ?1")
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![invite_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut scores = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            scores.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(scores)
    }

    fn scores_for_session(&self, session_id: SessionId) -> Result<Vec<HumanScore>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT human_scores.record_json FROM human_scores \
                 JOIN evaluator_invites \
                   ON human_scores.invite_id = evaluator_invites.invite_id \
                 WHERE evaluator_invites.session_id = ?1",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut scores = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            scores.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(scores)
    }

    fn append_business_event(&self, event: BusinessEvent) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO business_events (kind, payload_json, occurred_at) \
                 VALUES (?1, ?2, ?3)",
                params![
                    event.kind,
                    serde_json::to_string(&event.payload)
                        .map_err(|err| StoreError::Invalid(err.to_string()))?,
                    event.occurred_at.as_unix_micros()
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn business_events(&self) -> Result<Vec<BusinessEvent>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare("SELECT kind, payload_json, occurred_at FROM business_events ORDER BY id ASC")
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let payload: String = row.get(1)?;
                let occurred_at: i64 = row.get(2)?;
                Ok((kind, payload, occurred_at))
            })
            .map_err(|err| store_err(err.into()))?;
        let mut events = Vec::new();
        for row in rows {
            let (kind, payload, occurred_at) = row.map_err(|err| store_err(err.into()))?;
            events.push(BusinessEvent {
                kind,
                payload: serde_json::from_str(&payload)
                    .map_err(|err| StoreError::Corrupt(err.to_string()))?,
                occurred_at: Timestamp::from_unix_micros(occurred_at),
            });
        }
        Ok(events)
    }
}
