// crates/authority-kernel-core/src/runtime/replay.rs
// ============================================================================
// Module: Authority Kernel Replay Engine
// Description: Replay initiation and completion with hash-drift detection.
// Purpose: Re-derive and diff content hashes against sealed envelopes.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The replay engine does not reason; it only diffs. Initiation hands the
//! sealed canonical content back to the caller for re-execution under the
//! original seed, and completion compares the re-derived hash against the
//! stored hash exactly once. A mismatch is recorded as `DRIFT_DETECTED` and
//! treated as a hard failure by governance runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::codes::ErrorCode;
use crate::core::entropy::IdSource;
use crate::core::envelope::EnvelopeLocator;
use crate::core::envelope::EnvelopeStatus;
use crate::core::gate::GateSource;
use crate::core::hashing::ContentHash;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ReplayId;
use crate::core::replay::DriftDetails;
use crate::core::replay::DriftType;
use crate::core::replay::ReplayAttempt;
use crate::core::replay::ReplayCompletion;
use crate::core::replay::ReplayStatus;
use crate::core::time::Clock;
use crate::interfaces::EnvelopeError;
use crate::interfaces::EnvelopeStore;
use crate::interfaces::ReplayStore;
use crate::interfaces::ReplayStoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the replay engine.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The envelope store failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The replay store failed or rejected the completion.
    #[error(transparent)]
    Store(#[from] ReplayStoreError),
    /// The replay output could not be canonicalized for hashing.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ReplayError {
    /// Returns the stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Envelope(_) => ErrorCode::EnvelopeNotSealed,
            Self::Store(_) | Self::Hash(_) => ErrorCode::ValidationFailed,
        }
    }
}

// ============================================================================
// SECTION: Initiation Outcome
// ============================================================================

/// Result of a replay initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayInitiation {
    /// The recorded attempt (pending, or created terminal on lookup
    /// failure).
    pub attempt: ReplayAttempt,
    /// Canonical content handed back for re-execution, present only for
    /// pending attempts.
    pub content: Option<Vec<u8>>,
}

// ============================================================================
// SECTION: Replay Engine
// ============================================================================

/// Replay engine bound to the envelope and replay stores.
pub struct ReplayEngine<'a, E: EnvelopeStore, R: ReplayStore> {
    /// Envelope registry consulted for stored hashes.
    envelopes: &'a E,
    /// Replay attempt store.
    replays: &'a R,
    /// Identifier source for new attempts.
    ids: &'a dyn IdSource,
    /// Injected clock.
    clock: &'a dyn Clock,
}

impl<'a, E: EnvelopeStore, R: ReplayStore> ReplayEngine<'a, E, R> {
    /// Creates a replay engine.
    #[must_use]
    pub const fn new(
        envelopes: &'a E,
        replays: &'a R,
        ids: &'a dyn IdSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            envelopes,
            replays,
            ids,
            clock,
        }
    }

    /// Initiates a replay against a stored envelope hash.
    ///
    /// Missing envelopes record a terminal `ENVELOPE_NOT_FOUND` attempt;
    /// revoked and expired envelopes record a terminal `FAILED` attempt with
    /// a coded reason. Only sealed envelopes yield a `PENDING` attempt and
    /// the canonical content for re-execution.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] on infrastructure failure.
    pub fn initiate_replay(
        &self,
        sha256_hash: ContentHash,
        context: Value,
        requested_by: &str,
        source: GateSource,
    ) -> Result<ReplayInitiation, ReplayError> {
        let now = self.clock.now();
        let envelope = self.envelopes.find(&EnvelopeLocator::by_hash(sha256_hash.clone()))?;
        let mut attempt = ReplayAttempt {
            replay_id: ReplayId::new(self.ids.next_id()),
            envelope_id: envelope.as_ref().map(|envelope| envelope.envelope_id),
            envelope_hash: sha256_hash,
            replay_status: ReplayStatus::Pending,
            drift_details: None,
            failure_reason: None,
            context,
            requested_by: requested_by.to_string(),
            source,
            started_at: now,
            ended_at: None,
        };

        let content = match envelope {
            None => {
                attempt.replay_status = ReplayStatus::EnvelopeNotFound;
                attempt.ended_at = Some(now);
                None
            }
            Some(envelope) => match envelope.status {
                EnvelopeStatus::Revoked => {
                    attempt.replay_status = ReplayStatus::Failed;
                    attempt.failure_reason =
                        Some(ErrorCode::EnvelopeRevoked.as_str().to_string());
                    attempt.ended_at = Some(now);
                    None
                }
                EnvelopeStatus::Expired => {
                    attempt.replay_status = ReplayStatus::Failed;
                    attempt.failure_reason =
                        Some(ErrorCode::EnvelopeExpired.as_str().to_string());
                    attempt.ended_at = Some(now);
                    None
                }
                EnvelopeStatus::Sealed => {
                    Some(envelope.body.canonical_bytes().map_err(|err| {
                        ReplayError::Envelope(EnvelopeError::Invalid(err.to_string()))
                    })?)
                }
            },
        };

        self.replays.insert(attempt.clone()).map_err(ReplayStoreError::from)?;
        Ok(ReplayInitiation {
            attempt,
            content,
        })
    }

    /// Completes a pending replay, diffing the re-derived hash.
    ///
    /// When `new_hash` is absent it is derived from the canonical form of
    /// `replay_output`. Completion is a compare-and-set: a second completion
    /// attempt is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Store`] when the attempt is missing or already
    /// completed, and [`ReplayError::Hash`] when the output cannot be
    /// canonicalized.
    pub fn complete_replay(
        &self,
        replay_id: ReplayId,
        replay_output: &Value,
        new_hash: Option<ContentHash>,
    ) -> Result<ReplayAttempt, ReplayError> {
        let now = self.clock.now();
        let attempt = self
            .replays
            .attempt(replay_id)
            .map_err(ReplayStoreError::from)?
            .ok_or_else(|| ReplayStoreError::NotFound(replay_id.to_string()))?;
        let replay_hash = match new_hash {
            Some(hash) => hash,
            None => hash_canonical_json(replay_output)?,
        };

        let completion = if replay_hash == attempt.envelope_hash {
            ReplayCompletion {
                replay_status: ReplayStatus::Success,
                drift_details: None,
                failure_reason: None,
                ended_at: now,
            }
        } else {
            ReplayCompletion {
                replay_status: ReplayStatus::DriftDetected,
                drift_details: Some(DriftDetails {
                    original_hash: attempt.envelope_hash.clone(),
                    replay_hash,
                    drift_type: DriftType::HashMismatch,
                }),
                failure_reason: Some(ErrorCode::ReplayDriftDetected.as_str().to_string()),
                ended_at: now,
            }
        };
        Ok(self.replays.complete(replay_id, completion)?)
    }
}
