// crates/authority-kernel-core/src/core/replay.rs
// ============================================================================
// Module: Authority Kernel Replay Model
// Description: Replay attempt records and drift classification.
// Purpose: Capture initiation and completion of deterministic replays.
// Dependencies: serde, serde_json, crate::core::{gate, hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! A replay re-executes a reasoning call against a sealed envelope and diffs
//! the re-derived content hash against the stored hash. Attempts start
//! `PENDING` and end in exactly one terminal state; drift is a hard failure
//! in governance runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::gate::GateSource;
use crate::core::hashing::ContentHash;
use crate::core::identifiers::EnvelopeId;
use crate::core::identifiers::ReplayId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Replay attempt lifecycle status.
///
/// # Invariants
/// - `Pending` is the only non-terminal state; completion happens once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayStatus {
    /// Initiated and awaiting completion.
    Pending,
    /// Re-derived hash matched the stored hash.
    Success,
    /// Re-derived hash differed from the stored hash.
    DriftDetected,
    /// No envelope exists for the requested hash.
    EnvelopeNotFound,
    /// Replay failed before comparison (revoked/expired envelope, timeout).
    Failed,
}

impl ReplayStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ============================================================================
// SECTION: Drift Details
// ============================================================================

/// Classification of detected drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftType {
    /// Re-derived content hashed to a different digest.
    HashMismatch,
}

/// Evidence recorded when a replay drifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftDetails {
    /// Hash stored at seal time.
    pub original_hash: ContentHash,
    /// Hash re-derived by the replay.
    pub replay_hash: ContentHash,
    /// Drift classification.
    pub drift_type: DriftType,
}

// ============================================================================
// SECTION: Replay Attempt
// ============================================================================

/// Record of one replay attempt.
///
/// # Invariants
/// - `replay_status` transitions exactly once from `Pending` to a terminal
///   state (or is created terminal when initiation itself fails).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAttempt {
    /// Replay identifier.
    pub replay_id: ReplayId,
    /// Envelope identifier, when the envelope exists.
    pub envelope_id: Option<EnvelopeId>,
    /// Requested envelope hash.
    pub envelope_hash: ContentHash,
    /// Lifecycle status.
    pub replay_status: ReplayStatus,
    /// Drift evidence when drift was detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_details: Option<DriftDetails>,
    /// Failure reason code for terminal failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Caller-supplied replay context.
    pub context: Value,
    /// Actor that requested the replay.
    pub requested_by: String,
    /// Origin of the replay request.
    pub source: GateSource,
    /// Initiation instant.
    pub started_at: Timestamp,
    /// Completion instant for terminal attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Completion
// ============================================================================

/// Terminal update applied to a pending replay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayCompletion {
    /// Terminal status to record.
    pub replay_status: ReplayStatus,
    /// Drift evidence when drift was detected.
    pub drift_details: Option<DriftDetails>,
    /// Failure reason code for terminal failures.
    pub failure_reason: Option<String>,
    /// Completion instant.
    pub ended_at: Timestamp,
}
