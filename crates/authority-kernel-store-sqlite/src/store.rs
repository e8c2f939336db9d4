// crates/authority-kernel-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Kernel Store
// Description: Connection handling, schema, and shared helpers.
// Purpose: Durable backend for every Authority Kernel store interface.
// Dependencies: authority-kernel-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One SQLite database (WAL by default) backs the authority, envelope,
//! violation, replay, trace, audit, and governance stores. Key fields are
//! real columns for indexing and uniqueness; the full record persists as
//! canonical JSON alongside them. Append-only tables are guarded by
//! `RAISE(ABORT)` triggers so even raw SQL cannot update or delete them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use authority_kernel_core::Clock;
use authority_kernel_core::StoreError;
use authority_kernel_core::SystemClock;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version written into `control_plane_version`.
pub const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to SQLite `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the SQLite kernel store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// SQLite sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config with defaults for the provided path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for SQLite connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed kernel store.
///
/// # Invariants
/// - Every authority mutation and its audit row commit in one transaction.
/// - Connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteKernelStore {
    /// Shared connection guarded by a mutex.
    pub(crate) connection: Arc<Mutex<Connection>>,
    /// Clock stamping store-authored audit rows.
    pub(crate) clock: Arc<dyn Clock>,
}

impl SqliteKernelStore {
    /// Opens a SQLite-backed kernel store stamped by the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Opens a store stamped by an injected clock.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open_with_clock(
        config: &SqliteStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            clock,
        })
    }

    /// Locks the connection, mapping poisoning onto a db error.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite connection mutex poisoned".to_string()))
    }

    /// Returns the stored schema version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the version row cannot be read.
    pub fn schema_version(&self) -> Result<i64, SqliteStoreError> {
        let guard = self.lock()?;
        let version: i64 =
            guard.query_row("SELECT version FROM control_plane_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Rejects directory paths before opening.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(format!(
            "store path is a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Opens a connection with the configured pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    connection.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())?;
    connection.pragma_update(None, "synchronous", config.sync_mode.pragma_value())?;
    connection.pragma_update(None, "foreign_keys", "on")?;
    Ok(connection)
}

/// Creates every table, index, and append-only trigger.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS control_plane_version (
             version INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS enterprises (
             enterprise_id TEXT PRIMARY KEY,
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS workspaces (
             workspace_id TEXT PRIMARY KEY,
             enterprise_id TEXT NOT NULL REFERENCES enterprises(enterprise_id),
             deleted_at INTEGER,
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS execution_identities (
             user_id TEXT PRIMARY KEY,
             enterprise_id TEXT NOT NULL REFERENCES enterprises(enterprise_id),
             workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS personas (
             persona_id TEXT PRIMARY KEY,
             sub_vertical_id TEXT NOT NULL,
             created_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS personas_sub_vertical
             ON personas(sub_vertical_id, created_at);
         CREATE TABLE IF NOT EXISTS persona_policies (
             policy_id TEXT PRIMARY KEY,
             persona_id TEXT NOT NULL REFERENCES personas(persona_id),
             policy_version INTEGER NOT NULL,
             status TEXT NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE UNIQUE INDEX IF NOT EXISTS persona_policies_one_active
             ON persona_policies(persona_id) WHERE status = 'ACTIVE';
         CREATE TABLE IF NOT EXISTS territories (
             territory_id TEXT PRIMARY KEY,
             created_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS territory_sub_verticals (
             territory_id TEXT NOT NULL REFERENCES territories(territory_id),
             sub_vertical_id TEXT NOT NULL,
             PRIMARY KEY (territory_id, sub_vertical_id)
         );
         CREATE TABLE IF NOT EXISTS envelopes (
             envelope_id TEXT PRIMARY KEY,
             sha256_hash TEXT NOT NULL UNIQUE,
             status TEXT NOT NULL,
             sealed_at INTEGER NOT NULL,
             expires_at INTEGER,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS envelopes_expiry
             ON envelopes(status, expires_at);
         CREATE TABLE IF NOT EXISTS runtime_gate_violations (
             violation_id TEXT PRIMARY KEY,
             violation_code TEXT NOT NULL,
             occurred_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS violations_code_time
             ON runtime_gate_violations(violation_code, occurred_at);
         CREATE TABLE IF NOT EXISTS replay_attempts (
             replay_id TEXT PRIMARY KEY,
             envelope_hash TEXT NOT NULL,
             replay_status TEXT NOT NULL,
             started_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS replay_attempts_hash
             ON replay_attempts(envelope_hash, started_at);
         CREATE TABLE IF NOT EXISTS interactions (
             interaction_id TEXT PRIMARY KEY,
             envelope_sha256 TEXT NOT NULL,
             occurred_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS interactions_envelope
             ON interactions(envelope_sha256, occurred_at);
         CREATE TRIGGER IF NOT EXISTS interactions_no_update
             BEFORE UPDATE ON interactions
             BEGIN SELECT RAISE(ABORT, 'interactions are append-only'); END;
         CREATE TRIGGER IF NOT EXISTS interactions_no_delete
             BEFORE DELETE ON interactions
             BEGIN SELECT RAISE(ABORT, 'interactions are append-only'); END;
         CREATE TABLE IF NOT EXISTS audit_log (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             actor_id TEXT,
             actor_role TEXT NOT NULL,
             action TEXT NOT NULL,
             target_type TEXT NOT NULL,
             target_id TEXT NOT NULL,
             enterprise_id TEXT,
             success INTEGER NOT NULL,
             occurred_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS audit_actor_time ON audit_log(actor_id, occurred_at);
         CREATE INDEX IF NOT EXISTS audit_target_time
             ON audit_log(target_type, target_id, occurred_at);
         CREATE INDEX IF NOT EXISTS audit_enterprise_time
             ON audit_log(enterprise_id, occurred_at);
         CREATE TRIGGER IF NOT EXISTS audit_log_no_update
             BEFORE UPDATE ON audit_log
             BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;
         CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
             BEFORE DELETE ON audit_log
             BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;
         CREATE TABLE IF NOT EXISTS suites (
             suite_id TEXT PRIMARY KEY,
             base_suite_key TEXT NOT NULL,
             version INTEGER NOT NULL,
             record_json TEXT NOT NULL,
             UNIQUE (base_suite_key, version)
         );
         CREATE TABLE IF NOT EXISTS suite_scenarios (
             suite_id TEXT NOT NULL REFERENCES suites(suite_id),
             scenario_id TEXT NOT NULL,
             sequence_order INTEGER NOT NULL,
             record_json TEXT NOT NULL,
             PRIMARY KEY (suite_id, scenario_id)
         );
         CREATE TABLE IF NOT EXISTS runs (
             run_id TEXT PRIMARY KEY,
             suite_id TEXT NOT NULL REFERENCES suites(suite_id),
             run_number INTEGER NOT NULL,
             status TEXT NOT NULL,
             record_json TEXT NOT NULL,
             UNIQUE (suite_id, run_number)
         );
         CREATE TABLE IF NOT EXISTS run_results (
             run_id TEXT NOT NULL REFERENCES runs(run_id),
             scenario_id TEXT NOT NULL,
             sequence_order INTEGER NOT NULL,
             record_json TEXT NOT NULL,
             PRIMARY KEY (run_id, scenario_id)
         );
         CREATE TABLE IF NOT EXISTS human_sessions (
             session_id TEXT PRIMARY KEY,
             suite_id TEXT NOT NULL REFERENCES suites(suite_id),
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS evaluator_invites (
             invite_id TEXT PRIMARY KEY,
             session_id TEXT NOT NULL REFERENCES human_sessions(session_id),
             evaluator_index INTEGER NOT NULL,
             token TEXT NOT NULL UNIQUE,
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS evaluator_scenario_queue (
             invite_id TEXT NOT NULL REFERENCES evaluator_invites(invite_id),
             position INTEGER NOT NULL,
             scenario_id TEXT NOT NULL,
             PRIMARY KEY (invite_id, position)
         );
         CREATE TABLE IF NOT EXISTS human_scores (
             invite_id TEXT NOT NULL REFERENCES evaluator_invites(invite_id),
             scenario_id TEXT NOT NULL,
             record_json TEXT NOT NULL,
             PRIMARY KEY (invite_id, scenario_id)
         );
         CREATE TABLE IF NOT EXISTS business_events (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             kind TEXT NOT NULL,
             payload_json TEXT NOT NULL,
             occurred_at INTEGER NOT NULL
         );
         CREATE TRIGGER IF NOT EXISTS business_events_no_update
             BEFORE UPDATE ON business_events
             BEGIN SELECT RAISE(ABORT, 'business_events is append-only'); END;
         CREATE TRIGGER IF NOT EXISTS business_events_no_delete
             BEFORE DELETE ON business_events
             BEGIN SELECT RAISE(ABORT, 'business_events is append-only'); END;
         CREATE TABLE IF NOT EXISTS purge_config (
             key TEXT PRIMARY KEY,
             value_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS purge_jobs (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             dry_run INTEGER NOT NULL,
             planned_at INTEGER NOT NULL,
             record_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS export_requests (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id TEXT NOT NULL,
             scope TEXT NOT NULL,
             requested_at INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS rate_limit_log (
             user_id TEXT NOT NULL,
             action TEXT NOT NULL,
             occurred_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS rate_limit_user_action
             ON rate_limit_log(user_id, action, occurred_at);
         COMMIT;",
    )?;
    let existing: i64 =
        connection.query_row("SELECT COUNT(*) FROM control_plane_version", [], |row| row.get(0))?;
    if existing == 0 {
        connection
            .execute("INSERT INTO control_plane_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
    }
    Ok(())
}

// ============================================================================
// SECTION: JSON Helpers
// ============================================================================

/// Serializes a record for its JSON payload column.
pub(crate) fn to_record_json<T: Serialize>(record: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(record).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes a record from its JSON payload column.
pub(crate) fn from_record_json<T: serde::de::DeserializeOwned>(
    payload: &str,
) -> Result<T, SqliteStoreError> {
    serde_json::from_str(payload).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}
