// crates/authority-kernel-store-sqlite/src/replay.rs
// ============================================================================
// Module: SQLite Violation, Replay, Trace, and Audit Stores
// Description: Durable append-heavy logs of the kernel.
// Purpose: Persist gate violations, replay attempts, interactions, and audit.
// Dependencies: authority-kernel-core, rusqlite, crate::store
// ============================================================================

//! ## Overview
//! Violations, interactions, and audit entries are append-only; interactions
//! and audit rows are additionally trigger-guarded in the schema. Replay
//! completion uses a row-level compare-and-set
//! (`WHERE replay_status = 'PENDING'`) so an attempt completes exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::AuditEntry;
use authority_kernel_core::AuditFilter;
use authority_kernel_core::AuditLog;
use authority_kernel_core::ContentHash;
use authority_kernel_core::Interaction;
use authority_kernel_core::InteractionId;
use authority_kernel_core::ReplayAttempt;
use authority_kernel_core::ReplayCompletion;
use authority_kernel_core::ReplayId;
use authority_kernel_core::ReplayStatus;
use authority_kernel_core::ReplayStore;
use authority_kernel_core::ReplayStoreError;
use authority_kernel_core::RuntimeGateViolation;
use authority_kernel_core::StoreError;
use authority_kernel_core::Timestamp;
use authority_kernel_core::TraceStore;
use authority_kernel_core::ViolationCode;
use authority_kernel_core::ViolationId;
use authority_kernel_core::ViolationLog;
use authority_kernel_core::ViolationResolution;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::authority::insert_audit_tx;
use crate::store::SqliteKernelStore;
use crate::store::SqliteStoreError;
use crate::store::from_record_json;
use crate::store::to_record_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Failure reason recorded when the stale sweeper fails a pending replay.
const STALE_REPLAY_REASON: &str = "REPLAY_TIMEOUT";

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a SQLite error onto the generic store error channel.
fn store_err(error: SqliteStoreError) -> StoreError {
    StoreError::from(error)
}

/// Returns the stored status label for a replay status.
const fn replay_status_label(status: ReplayStatus) -> &'static str {
    match status {
        ReplayStatus::Pending => "PENDING",
        ReplayStatus::Success => "SUCCESS",
        ReplayStatus::DriftDetected => "DRIFT_DETECTED",
        ReplayStatus::EnvelopeNotFound => "ENVELOPE_NOT_FOUND",
        ReplayStatus::Failed => "FAILED",
    }
}

/// Returns the stored label for a violation code.
const fn violation_code_label(code: ViolationCode) -> &'static str {
    match code {
        ViolationCode::NoEnvelope => "NO_ENVELOPE",
        ViolationCode::InvalidEnvelope => "INVALID_ENVELOPE",
        ViolationCode::ExpiredEnvelope => "EXPIRED_ENVELOPE",
        ViolationCode::RevokedEnvelope => "REVOKED_ENVELOPE",
    }
}

// ============================================================================
// SECTION: Violation Log Implementation
// ============================================================================

impl ViolationLog for SqliteKernelStore {
    fn record(&self, violation: RuntimeGateViolation) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        guard
            .execute(
                "INSERT INTO runtime_gate_violations (violation_id, violation_code, \
                 occurred_at, record_json) VALUES (?1, ?2, ?3, ?4)",
                params![
                    violation.violation_id.to_string(),
                    violation_code_label(violation.violation_code),
                    violation.occurred_at.as_unix_micros(),
                    to_record_json(&violation).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn violations(
        &self,
        code: Option<ViolationCode>,
    ) -> Result<Vec<RuntimeGateViolation>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM runtime_gate_violations \
                 WHERE (?1 IS NULL OR violation_code = ?1) ORDER BY occurred_at DESC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![code.map(violation_code_label)], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut violations = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            violations.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(violations)
    }

    fn set_resolution(
        &self,
        violation_id: ViolationId,
        resolution: ViolationResolution,
        note: Option<String>,
    ) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM runtime_gate_violations WHERE violation_id = ?1",
                params![violation_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        let Some(payload) = payload else {
            return Err(StoreError::Invalid(format!("violation not found: {violation_id}")));
        };
        let mut violation: RuntimeGateViolation =
            from_record_json(&payload).map_err(store_err)?;
        violation.resolution_status = resolution;
        violation.resolution_note = note;
        guard
            .execute(
                "UPDATE runtime_gate_violations SET record_json = ?1 WHERE violation_id = ?2",
                params![to_record_json(&violation).map_err(store_err)?, violation_id.to_string()],
            )
            .map_err(|err| store_err(err.into()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Replay Store Implementation
// ============================================================================

impl ReplayStore for SqliteKernelStore {
    fn insert(&self, attempt: ReplayAttempt) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let inserted = guard
            .execute(
                "INSERT INTO replay_attempts (replay_id, envelope_hash, replay_status, \
                 started_at, record_json) VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(replay_id) DO NOTHING",
                params![
                    attempt.replay_id.to_string(),
                    attempt.envelope_hash.as_str(),
                    replay_status_label(attempt.replay_status),
                    attempt.started_at.as_unix_micros(),
                    to_record_json(&attempt).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        if inserted == 0 {
            return Err(StoreError::Invalid(format!(
                "replay attempt already exists: {}",
                attempt.replay_id
            )));
        }
        Ok(())
    }

    fn attempt(&self, replay_id: ReplayId) -> Result<Option<ReplayAttempt>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM replay_attempts WHERE replay_id = ?1",
                params![replay_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn complete(
        &self,
        replay_id: ReplayId,
        completion: ReplayCompletion,
    ) -> Result<ReplayAttempt, ReplayStoreError> {
        let guard = self.lock().map_err(|err| ReplayStoreError::Store(store_err(err)))?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM replay_attempts WHERE replay_id = ?1",
                params![replay_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| ReplayStoreError::Store(store_err(err.into())))?;
        let Some(payload) = payload else {
            return Err(ReplayStoreError::NotFound(replay_id.to_string()));
        };
        let mut attempt: ReplayAttempt = from_record_json(&payload)
            .map_err(|err| ReplayStoreError::Store(store_err(err)))?;
        attempt.replay_status = completion.replay_status;
        attempt.drift_details = completion.drift_details;
        attempt.failure_reason = completion.failure_reason;
        attempt.ended_at = Some(completion.ended_at);
        let changed = guard
            .execute(
                "UPDATE replay_attempts SET replay_status = ?1, record_json = ?2 \
                 WHERE replay_id = ?3 AND replay_status = 'PENDING'",
                params![
                    replay_status_label(attempt.replay_status),
                    to_record_json(&attempt)
                        .map_err(|err| ReplayStoreError::Store(store_err(err)))?,
                    replay_id.to_string()
                ],
            )
            .map_err(|err| ReplayStoreError::Store(store_err(err.into())))?;
        if changed == 0 {
            return Err(ReplayStoreError::AlreadyCompleted);
        }
        Ok(attempt)
    }

    fn history_for(&self, envelope_hash: &ContentHash) -> Result<Vec<ReplayAttempt>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM replay_attempts WHERE envelope_hash = ?1 \
                 ORDER BY started_at ASC, replay_id ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![envelope_hash.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut attempts = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            attempts.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(attempts)
    }

    fn sweep_stale(&self, cutoff: Timestamp, now: Timestamp) -> Result<u64, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM replay_attempts \
                 WHERE replay_status = 'PENDING' AND started_at <= ?1",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![cutoff.as_unix_micros()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut stale: Vec<ReplayAttempt> = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            stale.push(from_record_json(&payload).map_err(store_err)?);
        }
        drop(stmt);
        let mut transitioned = 0u64;
        for mut attempt in stale {
            attempt.replay_status = ReplayStatus::Failed;
            attempt.failure_reason = Some(STALE_REPLAY_REASON.to_string());
            attempt.ended_at = Some(now);
            let changed = guard
                .execute(
                    "UPDATE replay_attempts SET replay_status = 'FAILED', record_json = ?1 \
                     WHERE replay_id = ?2 AND replay_status = 'PENDING'",
                    params![
                        to_record_json(&attempt).map_err(store_err)?,
                        attempt.replay_id.to_string()
                    ],
                )
                .map_err(|err| store_err(err.into()))?;
            transitioned = transitioned.saturating_add(u64::from(changed == 1));
        }
        Ok(transitioned)
    }
}

// ============================================================================
// SECTION: Trace Store Implementation
// ============================================================================

impl TraceStore for SqliteKernelStore {
    fn append(&self, interaction: Interaction) -> Result<(), StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let inserted = guard
            .execute(
                "INSERT INTO interactions (interaction_id, envelope_sha256, occurred_at, \
                 record_json) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(interaction_id) DO NOTHING",
                params![
                    interaction.interaction_id.to_string(),
                    interaction.envelope_sha256.as_str(),
                    interaction.occurred_at.as_unix_micros(),
                    to_record_json(&interaction).map_err(store_err)?
                ],
            )
            .map_err(|err| store_err(err.into()))?;
        if inserted == 0 {
            return Err(StoreError::Invalid(format!(
                "interaction already recorded: {}",
                interaction.interaction_id
            )));
        }
        Ok(())
    }

    fn interaction(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Option<Interaction>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT record_json FROM interactions WHERE interaction_id = ?1",
                params![interaction_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| store_err(err.into()))?;
        payload.map(|payload| from_record_json(&payload).map_err(store_err)).transpose()
    }

    fn interactions_for(
        &self,
        envelope_hash: &ContentHash,
    ) -> Result<Vec<Interaction>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM interactions WHERE envelope_sha256 = ?1 \
                 ORDER BY occurred_at ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(params![envelope_hash.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| store_err(err.into()))?;
        let mut interactions = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            interactions.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(interactions)
    }
}

// ============================================================================
// SECTION: Audit Log Implementation
// ============================================================================

impl AuditLog for SqliteKernelStore {
    fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        let mut guard = self.lock().map_err(store_err)?;
        let tx = guard.transaction().map_err(|err| store_err(err.into()))?;
        insert_audit_tx(&tx, &entry).map_err(store_err)?;
        tx.commit().map_err(|err| store_err(err.into()))?;
        Ok(())
    }

    fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let guard = self.lock().map_err(store_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM audit_log \
                 WHERE (?1 IS NULL OR actor_id = ?1) \
                   AND (?2 IS NULL OR (target_type = ?2 AND target_id = ?3)) \
                   AND (?4 IS NULL OR enterprise_id = ?4) \
                   AND (?5 IS NULL OR occurred_at >= ?5) \
                   AND (?6 IS NULL OR occurred_at <= ?6) \
                 ORDER BY occurred_at ASC, id ASC",
            )
            .map_err(|err| store_err(err.into()))?;
        let rows = stmt
            .query_map(
                params![
                    filter.actor_id.map(|id| id.to_string()),
                    filter.target.as_ref().map(|(target_type, _)| target_type.clone()),
                    filter.target.as_ref().map(|(_, target_id)| target_id.clone()),
                    filter.enterprise_id.map(|id| id.to_string()),
                    filter.from.map(|at| at.as_unix_micros()),
                    filter.until.map(|at| at.as_unix_micros()),
                ],
                |row| row.get::<_, String>(0),
            )
            .map_err(|err| store_err(err.into()))?;
        let mut entries = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| store_err(err.into()))?;
            entries.push(from_record_json(&payload).map_err(store_err)?);
        }
        Ok(entries)
    }
}
