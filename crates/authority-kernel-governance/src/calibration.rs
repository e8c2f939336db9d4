// crates/authority-kernel-governance/src/calibration.rs
// ============================================================================
// Module: Human Calibration
// Description: Calibration sessions, evaluator invites, and seeded queues.
// Purpose: Gate HUMAN_VALIDATED promotion on inter-rater correlation.
// Dependencies: authority-kernel-core, serde, crate::validation
// ============================================================================

//! ## Overview
//! A calibration session issues one tokenized invite per evaluator, each
//! with an independently shuffled scenario queue that is deterministic and
//! reproducible from `(evaluator_index, scenario_count)`. Evaluators submit
//! eight dimension scores per scenario; when every invite completes, the
//! session computes Spearman rho between machine and average human weighted
//! CRS and gates promotion on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::InviteId;
use authority_kernel_core::RunId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SessionId;
use authority_kernel_core::SuiteId;
use authority_kernel_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;

use crate::validation::DimensionScores;

// ============================================================================
// SECTION: Session
// ============================================================================

/// Calibration session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Invites outstanding.
    InProgress,
    /// Completed with correlation at or above the gate.
    Completed,
    /// Completed with correlation below the gate.
    Failed,
}

/// Human calibration session over a validated suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSession {
    /// Session identifier.
    pub session_id: SessionId,
    /// Suite under calibration.
    pub suite_id: SuiteId,
    /// Machine baseline run the correlation compares against.
    pub run_id: RunId,
    /// Evaluator deadline.
    pub deadline: Timestamp,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Spearman rho between machine and average human CRS, once computed.
    pub spearman_rho: Option<f64>,
    /// ICC(2,1) agreement across evaluators, once computed.
    pub icc: Option<f64>,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Completion instant, once finished.
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Invites
// ============================================================================

/// Evaluator invite lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    /// Awaiting scores.
    Pending,
    /// Every queued scenario scored.
    Completed,
}

/// Tokenized invite for one evaluator.
///
/// # Invariants
/// - `token` is 48 random bytes rendered URL-safe and is single-holder: the
///   first access pins `first_accessed_at`; later accesses resume.
/// - `expires_at` is the session deadline plus one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorInvite {
    /// Invite identifier.
    pub invite_id: InviteId,
    /// Owning session.
    pub session_id: SessionId,
    /// Evaluator email address.
    pub evaluator_email: String,
    /// Zero-based evaluator index seeding the queue shuffle.
    pub evaluator_index: u32,
    /// URL-safe access token.
    pub token: String,
    /// Token expiry instant.
    pub expires_at: Timestamp,
    /// Lifecycle status.
    pub status: InviteStatus,
    /// First access instant, once accessed.
    pub first_accessed_at: Option<Timestamp>,
    /// User agent recorded at first access.
    pub first_user_agent: Option<String>,
    /// IP address recorded at first access.
    pub first_ip: Option<String>,
}

// ============================================================================
// SECTION: Scores
// ============================================================================

/// Evaluator pursuit decision for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PursueDecision {
    /// Would pursue the opportunity.
    Yes,
    /// Would not pursue.
    No,
    /// Undecided.
    Maybe,
}

/// One evaluator's scores for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanScore {
    /// Submitting invite.
    pub invite_id: InviteId,
    /// Scored scenario.
    pub scenario_id: ScenarioId,
    /// Eight dimension scores in [1, 5].
    pub dimensions: DimensionScores,
    /// Pursuit decision.
    pub would_pursue: PursueDecision,
    /// Evaluator confidence in [1, 5].
    pub confidence: u8,
    /// Submission instant.
    pub submitted_at: Timestamp,
}

/// Per-scenario submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    /// Scored scenario.
    pub scenario_id: ScenarioId,
    /// Eight dimension scores in [1, 5].
    pub dimensions: DimensionScores,
    /// Pursuit decision.
    pub would_pursue: PursueDecision,
    /// Evaluator confidence in [1, 5].
    pub confidence: u8,
}

// ============================================================================
// SECTION: Seeded Shuffle
// ============================================================================

/// Produces the deterministic scenario order for one evaluator.
///
/// Fisher-Yates over indices `0..scenario_count`, walking `j` from the top;
/// the swap index at step `j` is
/// `floor((((i + 1) * 12345 + j) * 9301 + 49297) mod 233280 / 233280 * (j + 1))`
/// with `i` the evaluator index. Integer arithmetic keeps the order
/// byte-identical across platforms.
#[must_use]
pub fn seeded_shuffle(evaluator_index: u32, scenario_count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0 .. scenario_count).collect();
    let seed = u64::from(evaluator_index) + 1;
    for j in (1 .. scenario_count).rev() {
        let j_u64 = u64::try_from(j).unwrap_or(u64::MAX);
        let r = (seed.wrapping_mul(12_345).wrapping_add(j_u64))
            .wrapping_mul(9_301)
            .wrapping_add(49_297)
            % 233_280;
        let k = usize::try_from(r.saturating_mul(j_u64 + 1) / 233_280).unwrap_or(0);
        order.swap(j, k);
    }
    order
}
