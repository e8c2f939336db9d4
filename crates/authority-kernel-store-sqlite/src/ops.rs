// crates/authority-kernel-store-sqlite/src/ops.rs
// ============================================================================
// Module: SQLite Operational Jobs
// Description: Hard-purge planning and sensitive-read rate accounting.
// Purpose: Bound retention without ever touching append-only evidence.
// Dependencies: authority-kernel-core, rusqlite, serde, crate::store
// ============================================================================

//! ## Overview
//! Hard purge is dry-run by default and guarded by a master switch that
//! defaults to off; business events, interactions, and audit rows are never
//! in scope. The rate-limit log tracks sensitive reads per `(user, action)`
//! with a 24-hour retention window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::IdentityId;
use authority_kernel_core::Timestamp;
use authority_kernel_core::WorkspaceId;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::store::SqliteKernelStore;
use crate::store::SqliteStoreError;
use crate::store::to_record_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Retention window of the rate-limit log in hours.
const RATE_LIMIT_RETENTION_HOURS: i64 = 24;

// ============================================================================
// SECTION: Purge Configuration
// ============================================================================

/// Retention bounds for the hard-purge job.
///
/// # Invariants
/// - `hard_purge_enabled` defaults to off and stays off until replay safety
///   is addressed by a separate design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Days a soft-deleted workspace must age before purge eligibility.
    pub soft_delete_window_days: u32,
    /// Months behavioral signals are retained.
    pub bte_signal_retention_months: u32,
    /// Months audit entries are retained.
    pub audit_retention_months: u32,
    /// Master switch for destructive purging.
    pub hard_purge_enabled: bool,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            soft_delete_window_days: 90,
            bte_signal_retention_months: 18,
            audit_retention_months: 84,
            hard_purge_enabled: false,
        }
    }
}

/// Plan produced by a purge pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgePlan {
    /// Workspaces whose soft-delete window has elapsed.
    pub eligible_workspaces: Vec<WorkspaceId>,
    /// True when no row was touched.
    pub dry_run: bool,
    /// Planning instant.
    pub planned_at: Timestamp,
}

// ============================================================================
// SECTION: Purge Job
// ============================================================================

impl SqliteKernelStore {
    /// Plans (and, only when enabled, executes) a hard purge.
    ///
    /// With the master switch off this is always a dry run: eligible rows
    /// are listed, a job record is written, and nothing is deleted.
    /// Business events, interactions, and audit rows are never eligible.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on infrastructure failure.
    pub fn run_hard_purge(
        &self,
        config: &PurgeConfig,
        now: Timestamp,
    ) -> Result<PurgePlan, SqliteStoreError> {
        let cutoff =
            now.saturating_add_days(-i64::from(config.soft_delete_window_days));
        let mut guard = self.lock()?;
        let tx = guard.transaction()?;
        let eligible_workspaces = {
            let mut stmt = tx.prepare(
                "SELECT workspace_id FROM workspaces \
                 WHERE deleted_at IS NOT NULL AND deleted_at <= ?1",
            )?;
            let rows =
                stmt.query_map(params![cutoff.as_unix_micros()], |row| row.get::<_, String>(0))?;
            let mut eligible = Vec::new();
            for row in rows {
                let raw = row?;
                let parsed = Uuid::parse_str(&raw)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
                eligible.push(WorkspaceId::new(parsed));
            }
            eligible
        };
        let dry_run = !config.hard_purge_enabled;
        if !dry_run {
            for workspace_id in &eligible_workspaces {
                tx.execute(
                    "DELETE FROM execution_identities WHERE workspace_id = ?1",
                    params![workspace_id.to_string()],
                )?;
                tx.execute(
                    "DELETE FROM workspaces WHERE workspace_id = ?1",
                    params![workspace_id.to_string()],
                )?;
            }
        }
        let plan = PurgePlan {
            eligible_workspaces,
            dry_run,
            planned_at: now,
        };
        tx.execute(
            "INSERT INTO purge_jobs (dry_run, planned_at, record_json) VALUES (?1, ?2, ?3)",
            params![i64::from(plan.dry_run), now.as_unix_micros(), to_record_json(&plan)?],
        )?;
        tx.commit()?;
        Ok(plan)
    }
}

// ============================================================================
// SECTION: Rate-Limit Log
// ============================================================================

impl SqliteKernelStore {
    /// Records one sensitive read for `(user, action)` and prunes entries
    /// past the 24-hour retention window.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on infrastructure failure.
    pub fn record_sensitive_read(
        &self,
        user_id: IdentityId,
        action: &str,
        now: Timestamp,
    ) -> Result<(), SqliteStoreError> {
        let retention_cutoff =
            now.saturating_add_seconds(-RATE_LIMIT_RETENTION_HOURS * 3_600);
        let guard = self.lock()?;
        guard.execute(
            "DELETE FROM rate_limit_log WHERE occurred_at < ?1",
            params![retention_cutoff.as_unix_micros()],
        )?;
        guard.execute(
            "INSERT INTO rate_limit_log (user_id, action, occurred_at) VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), action, now.as_unix_micros()],
        )?;
        Ok(())
    }

    /// Records an export request for compliance review.
    ///
    /// Export requests count as sensitive reads; callers should pair this
    /// with [`SqliteKernelStore::record_sensitive_read`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on infrastructure failure.
    pub fn record_export_request(
        &self,
        user_id: IdentityId,
        scope: &str,
        now: Timestamp,
    ) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.execute(
            "INSERT INTO export_requests (user_id, scope, requested_at) VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), scope, now.as_unix_micros()],
        )?;
        Ok(())
    }

    /// Counts sensitive reads for `(user, action)` since `since`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on infrastructure failure.
    pub fn sensitive_read_count(
        &self,
        user_id: IdentityId,
        action: &str,
        since: Timestamp,
    ) -> Result<u64, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard.query_row(
            "SELECT COUNT(*) FROM rate_limit_log \
             WHERE user_id = ?1 AND action = ?2 AND occurred_at >= ?3",
            params![user_id.to_string(), action, since.as_unix_micros()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
