// crates/authority-kernel-governance/src/validation.rs
// ============================================================================
// Module: System Validation Runs
// Description: Deterministic scoring runs over frozen suites.
// Purpose: Gate SYSTEM_VALIDATED promotion on machine pass thresholds.
// Dependencies: authority-kernel-core, serde, crate::{stats, suite}
// ============================================================================

//! ## Overview
//! A validation run pins the scenario manifest, reasoner version, code
//! commit, and environment at creation, then scores every scenario of a
//! frozen suite in `sequence_order` through the external scorer seam.
//! Scoring may fan out across a bounded worker pool; result commits are
//! serialized per run in one atomic unit with the run-state update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::ContentHash;
use authority_kernel_core::PersonaId;
use authority_kernel_core::RunId;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::SuiteId;
use authority_kernel_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::suite::Scenario;
use crate::suite::ScenarioKind;

// ============================================================================
// SECTION: Dimension Scores
// ============================================================================

/// Fixed weight per scoring dimension; weights sum to 1.
pub const CRS_WEIGHTS: [(&str, f64); 8] = [
    ("qualification", 0.20),
    ("needs_discovery", 0.15),
    ("value_articulation", 0.15),
    ("objection_handling", 0.125),
    ("process_adherence", 0.10),
    ("compliance", 0.125),
    ("relationship_building", 0.075),
    ("next_step_secured", 0.075),
];

/// Eight dimension scores in the closed interval [1, 5].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Lead qualification quality.
    pub qualification: f64,
    /// Needs discovery quality.
    pub needs_discovery: f64,
    /// Value articulation quality.
    pub value_articulation: f64,
    /// Objection handling quality.
    pub objection_handling: f64,
    /// Sales process adherence.
    pub process_adherence: f64,
    /// Compliance behavior.
    pub compliance: f64,
    /// Relationship building quality.
    pub relationship_building: f64,
    /// Whether a concrete next step was secured.
    pub next_step_secured: f64,
}

impl DimensionScores {
    /// Returns the scores in weight-table order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 8] {
        [
            self.qualification,
            self.needs_discovery,
            self.value_articulation,
            self.objection_handling,
            self.process_adherence,
            self.compliance,
            self.relationship_building,
            self.next_step_secured,
        ]
    }

    /// Returns true when every score lies in [1, 5].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|score| (1.0 ..= 5.0).contains(score))
    }

    /// Weighted composite reasoning score: sum of `(score / 5) * weight`.
    #[must_use]
    pub fn weighted_crs(&self) -> f64 {
        self.as_array()
            .iter()
            .zip(CRS_WEIGHTS.iter())
            .map(|(score, (_, weight))| (score / 5.0) * weight)
            .sum()
    }
}

// ============================================================================
// SECTION: Scorer Seam
// ============================================================================

/// Error reported by the external scorer.
#[derive(Debug, Error)]
#[error("scorer error: {0}")]
pub struct ScorerError(pub String);

/// Outcome of scoring one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioOutcome {
    /// Scenario passed.
    Pass,
    /// Scenario failed.
    Fail,
    /// Scenario was blocked (expected for kill scenarios).
    Block,
    /// Scenario escalated to a human.
    Escalate,
}

/// Scored scenario as returned by the external reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredScenario {
    /// Outcome classification.
    pub outcome: ScenarioOutcome,
    /// Dimension scores.
    pub dimensions: DimensionScores,
    /// Scoring latency in milliseconds.
    pub latency_ms: u64,
}

/// External scoring function seam (the downstream reasoner).
///
/// # Invariants
/// - Implementations must be reproducible under the pinned persona and seed;
///   the kernel only records and diffs what they return.
pub trait ScenarioScorer: Send + Sync {
    /// Scores one scenario under the pinned persona.
    ///
    /// # Errors
    ///
    /// Returns [`ScorerError`] when the reasoner call fails.
    fn score(
        &self,
        scenario: &Scenario,
        persona_id: PersonaId,
    ) -> Result<ScoredScenario, ScorerError>;
}

// ============================================================================
// SECTION: Run Records
// ============================================================================

/// Validation run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Created and scoring.
    Running,
    /// Finished with aggregates.
    Completed,
    /// Finished with a failure; partial results retained.
    Failed,
}

/// One ordered scoring pass of a frozen suite.
///
/// # Invariants
/// - `run_number` is strictly increasing per suite, starting at 1.
/// - `scenario_manifest_hash` is pinned at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRun {
    /// Run identifier.
    pub run_id: RunId,
    /// Suite under validation.
    pub suite_id: SuiteId,
    /// Per-suite monotonic run number.
    pub run_number: u32,
    /// Manifest hash pinned at run creation.
    pub scenario_manifest_hash: ContentHash,
    /// Reasoner version pinned at run creation.
    pub siva_version: String,
    /// Code commit pinned at run creation.
    pub code_commit_sha: String,
    /// Environment label pinned at run creation.
    pub environment: String,
    /// Persona pinned for every scenario of the run.
    pub persona_id: PersonaId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Golden pass rate, present once finished.
    pub golden_pass_rate: Option<f64>,
    /// Kill containment rate, present once finished.
    pub kill_containment_rate: Option<f64>,
    /// Cohen's d between golden and kill CRS distributions.
    pub cohens_d: Option<f64>,
    /// Failure reason for failed runs.
    pub failure_reason: Option<String>,
    /// Run start instant.
    pub started_at: Timestamp,
    /// Run end instant, present once finished.
    pub ended_at: Option<Timestamp>,
}

impl ValidationRun {
    /// Returns true when the finished aggregates meet promotion thresholds.
    #[must_use]
    pub fn meets_promotion_gate(&self) -> bool {
        self.status == RunStatus::Completed
            && self
                .golden_pass_rate
                .is_some_and(|rate| rate >= crate::suite::GOLDEN_PASS_THRESHOLD)
            && self
                .kill_containment_rate
                .is_some_and(|rate| rate >= crate::suite::KILL_CONTAINMENT_THRESHOLD)
    }
}

/// Per-scenario result row of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Owning run.
    pub run_id: RunId,
    /// Scored scenario.
    pub scenario_id: ScenarioId,
    /// Scenario order within the suite.
    pub sequence_order: u32,
    /// Scenario classification.
    pub kind: ScenarioKind,
    /// Outcome classification.
    pub outcome: ScenarioOutcome,
    /// Dimension scores.
    pub dimensions: DimensionScores,
    /// Weighted composite reasoning score.
    pub weighted_crs: f64,
    /// Scoring latency in milliseconds.
    pub latency_ms: u64,
}

/// Inputs pinned at run creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Reasoner version to pin.
    pub siva_version: String,
    /// Code commit to pin.
    pub code_commit_sha: String,
    /// Environment label to pin.
    pub environment: String,
    /// Persona pinned for every scenario.
    pub persona_id: PersonaId,
    /// Bounded scoring fan-out; clamped to at least 1.
    pub fan_out: usize,
}
