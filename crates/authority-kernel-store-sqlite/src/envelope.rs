// crates/authority-kernel-store-sqlite/src/envelope.rs
// ============================================================================
// Module: SQLite Envelope Registry
// Description: Content-addressed envelope storage with idempotent seal.
// Purpose: Persist sealed envelopes keyed by canonical content hash.
// Dependencies: authority-kernel-core, rusqlite, crate::store
// ============================================================================

//! ## Overview
//! The `sha256_hash` column is unique; sealing uses
//! `INSERT ... ON CONFLICT(sha256_hash) DO NOTHING` so concurrent seals of
//! identical content converge on one row. Terminal transitions are guarded
//! in SQL (`WHERE status = 'SEALED'`) so a lost race surfaces as
//! already-terminal instead of silently overwriting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::Envelope;
use authority_kernel_core::EnvelopeError;
use authority_kernel_core::EnvelopeId;
use authority_kernel_core::EnvelopeLocator;
use authority_kernel_core::EnvelopeStatus;
use authority_kernel_core::EnvelopeStore;
use authority_kernel_core::SealOutcome;
use authority_kernel_core::StoreError;
use authority_kernel_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::store::SqliteKernelStore;
use crate::store::SqliteStoreError;
use crate::store::from_record_json;
use crate::store::to_record_json;

// ============================================================================
// SECTION: Row Helpers
// ============================================================================

/// Maps a SQLite error onto the envelope error channel.
fn db_err(error: SqliteStoreError) -> EnvelopeError {
    EnvelopeError::Store(StoreError::from(error))
}

/// Loads an envelope row by hash.
fn envelope_by_hash(
    connection: &Connection,
    sha256_hash: &str,
) -> Result<Option<Envelope>, SqliteStoreError> {
    let payload: Option<String> = connection
        .query_row(
            "SELECT record_json FROM envelopes WHERE sha256_hash = ?1",
            params![sha256_hash],
            |row| row.get(0),
        )
        .optional()?;
    payload.map(|payload| from_record_json(&payload)).transpose()
}

/// Loads an envelope row by identifier.
fn envelope_by_id(
    connection: &Connection,
    envelope_id: EnvelopeId,
) -> Result<Option<Envelope>, SqliteStoreError> {
    let payload: Option<String> = connection
        .query_row(
            "SELECT record_json FROM envelopes WHERE envelope_id = ?1",
            params![envelope_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    payload.map(|payload| from_record_json(&payload)).transpose()
}

/// Persists an updated envelope record guarded on the sealed status.
fn update_envelope_from_sealed(
    connection: &Connection,
    envelope: &Envelope,
) -> Result<bool, SqliteStoreError> {
    let changed = connection.execute(
        "UPDATE envelopes SET status = ?1, expires_at = ?2, record_json = ?3 \
         WHERE envelope_id = ?4 AND status = 'SEALED'",
        params![
            status_label(envelope.status),
            envelope.body.expires_at.map(|at| at.as_unix_micros()),
            to_record_json(envelope)?,
            envelope.envelope_id.to_string()
        ],
    )?;
    Ok(changed == 1)
}

/// Returns the stored status label for an envelope status.
const fn status_label(status: EnvelopeStatus) -> &'static str {
    match status {
        EnvelopeStatus::Sealed => "SEALED",
        EnvelopeStatus::Expired => "EXPIRED",
        EnvelopeStatus::Revoked => "REVOKED",
    }
}

// ============================================================================
// SECTION: Envelope Store Implementation
// ============================================================================

impl EnvelopeStore for SqliteKernelStore {
    fn seal(&self, envelope: Envelope) -> Result<SealOutcome, EnvelopeError> {
        let computed = envelope
            .body
            .compute_hash()
            .map_err(|err| EnvelopeError::Invalid(err.to_string()))?;
        if computed != envelope.sha256_hash {
            return Err(EnvelopeError::Invalid(
                "sha256_hash does not match canonical body".to_string(),
            ));
        }
        let guard = self.lock().map_err(db_err)?;
        let inserted = guard
            .execute(
                "INSERT INTO envelopes (envelope_id, sha256_hash, status, sealed_at, \
                 expires_at, record_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(sha256_hash) DO NOTHING",
                params![
                    envelope.envelope_id.to_string(),
                    envelope.sha256_hash.as_str(),
                    status_label(envelope.status),
                    envelope.body.sealed_at.as_unix_micros(),
                    envelope.body.expires_at.map(|at| at.as_unix_micros()),
                    to_record_json(&envelope).map_err(db_err)?
                ],
            )
            .map_err(|err| db_err(err.into()))?;
        let stored = envelope_by_hash(&guard, envelope.sha256_hash.as_str())
            .map_err(db_err)?
            .ok_or_else(|| {
                EnvelopeError::Store(StoreError::Corrupt(
                    "sealed envelope row disappeared".to_string(),
                ))
            })?;
        Ok(SealOutcome {
            envelope_id: stored.envelope_id,
            sha256_hash: stored.sha256_hash,
            is_new: inserted == 1,
            sealed_at: stored.body.sealed_at,
        })
    }

    fn find(&self, locator: &EnvelopeLocator) -> Result<Option<Envelope>, EnvelopeError> {
        if locator.is_empty() {
            return Err(EnvelopeError::Invalid(
                "locator requires an envelope id or hash".to_string(),
            ));
        }
        let guard = self.lock().map_err(db_err)?;
        let by_id = locator
            .envelope_id
            .map(|envelope_id| envelope_by_id(&guard, envelope_id))
            .transpose()
            .map_err(db_err)?
            .flatten();
        let by_hash = locator
            .sha256_hash
            .as_ref()
            .map(|hash| envelope_by_hash(&guard, hash.as_str()))
            .transpose()
            .map_err(db_err)?
            .flatten();
        match (locator.envelope_id, locator.sha256_hash.as_ref()) {
            (Some(_), Some(_)) => match (by_id, by_hash) {
                (Some(a), Some(b)) if a.envelope_id == b.envelope_id => Ok(Some(a)),
                (None, None) => Ok(None),
                _ => Err(EnvelopeError::Invalid(
                    "envelope id and hash address different envelopes".to_string(),
                )),
            },
            (Some(_), None) => Ok(by_id),
            (None, _) => Ok(by_hash),
        }
    }

    fn revoke(
        &self,
        envelope_id: EnvelopeId,
        revoked_by: &str,
        now: Timestamp,
    ) -> Result<Envelope, EnvelopeError> {
        let guard = self.lock().map_err(db_err)?;
        let Some(mut envelope) = envelope_by_id(&guard, envelope_id).map_err(db_err)? else {
            return Err(EnvelopeError::NotFound(envelope_id.to_string()));
        };
        if !envelope.status.may_transition_to(EnvelopeStatus::Revoked) {
            return Err(EnvelopeError::AlreadyTerminal {
                status: envelope.status,
            });
        }
        envelope.status = EnvelopeStatus::Revoked;
        envelope.revoked_at = Some(now);
        envelope.revoked_by = Some(revoked_by.to_string());
        if !update_envelope_from_sealed(&guard, &envelope).map_err(db_err)? {
            return Err(EnvelopeError::AlreadyTerminal {
                status: envelope.status,
            });
        }
        Ok(envelope)
    }

    fn sweep_expired(&self, now: Timestamp) -> Result<u64, EnvelopeError> {
        let guard = self.lock().map_err(db_err)?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json FROM envelopes \
                 WHERE status = 'SEALED' AND expires_at IS NOT NULL AND expires_at < ?1",
            )
            .map_err(|err| db_err(err.into()))?;
        let rows = stmt
            .query_map(params![now.as_unix_micros()], |row| row.get::<_, String>(0))
            .map_err(|err| db_err(err.into()))?;
        let mut expiring: Vec<Envelope> = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| db_err(err.into()))?;
            expiring.push(from_record_json(&payload).map_err(db_err)?);
        }
        drop(stmt);
        let mut transitioned = 0u64;
        for mut envelope in expiring {
            envelope.status = EnvelopeStatus::Expired;
            envelope.expired_at = Some(now);
            if update_envelope_from_sealed(&guard, &envelope).map_err(db_err)? {
                transitioned = transitioned.saturating_add(1);
            }
        }
        Ok(transitioned)
    }
}
