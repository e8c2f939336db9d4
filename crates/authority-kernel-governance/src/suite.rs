// crates/authority-kernel-governance/src/suite.rs
// ============================================================================
// Module: Suite Model
// Description: Benchmark suites, scenarios, manifest hashing, and errors.
// Purpose: Define the records and vocabulary of suite governance.
// Dependencies: authority-kernel-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A suite is a versioned set of scored scenarios whose lifecycle gates
//! production use of a reasoning configuration. Freezing pins the scenario
//! set under a manifest hash computed over the ordered
//! `(scenario_id, scenario_hash)` pairs; every later run and calibration
//! session references that hash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use authority_kernel_core::ContentHash;
use authority_kernel_core::ErrorCode;
use authority_kernel_core::HashError;
use authority_kernel_core::ScenarioId;
use authority_kernel_core::StoreError;
use authority_kernel_core::SuiteId;
use authority_kernel_core::SuiteKey;
use authority_kernel_core::Timestamp;
use authority_kernel_core::hash_canonical_json;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Minimum golden pass rate for system validation.
pub const GOLDEN_PASS_THRESHOLD: f64 = 0.90;
/// Minimum kill containment rate for system validation.
pub const KILL_CONTAINMENT_THRESHOLD: f64 = 0.95;
/// Minimum Spearman rho for human validation.
pub const CORRELATION_THRESHOLD: f64 = 0.60;
/// Minimum evaluator count for a calibration session.
pub const MIN_EVALUATORS: usize = 2;
/// Default bounded fan-out for scenario scoring.
pub const DEFAULT_SCORING_FAN_OUT: usize = 8;

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Suite lifecycle status.
///
/// # Invariants
/// - Promotion order is DRAFT, SYSTEM_VALIDATED, HUMAN_VALIDATED,
///   GA_APPROVED; DEPRECATED is reachable from any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuiteStatus {
    /// Under construction; scenarios mutable until frozen.
    Draft,
    /// Passed machine validation thresholds.
    SystemValidated,
    /// Passed human calibration correlation gate.
    HumanValidated,
    /// Approved for production use.
    GaApproved,
    /// Retired.
    Deprecated,
}

impl SuiteStatus {
    /// Returns the stable wire string for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::SystemValidated => "SYSTEM_VALIDATED",
            Self::HumanValidated => "HUMAN_VALIDATED",
            Self::GaApproved => "GA_APPROVED",
            Self::Deprecated => "DEPRECATED",
        }
    }
}

/// Versioned benchmark suite.
///
/// # Invariants
/// - `version` is monotone per `base_suite_key`.
/// - Once `is_frozen`, the scenario set and manifest hash never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    /// Suite identifier.
    pub suite_id: SuiteId,
    /// Stable key of this suite version.
    pub suite_key: SuiteKey,
    /// Version within the base key lineage, starting at 1.
    pub version: u32,
    /// Lineage key shared by all versions.
    pub base_suite_key: SuiteKey,
    /// Whether the scenario set is frozen.
    pub is_frozen: bool,
    /// Manifest hash pinned at freeze time.
    pub scenario_manifest_hash: Option<ContentHash>,
    /// Scenario count pinned at freeze time.
    pub scenario_count: u32,
    /// Lifecycle status.
    pub status: SuiteStatus,
    /// Deprecation reason, once deprecated.
    pub deprecated_reason: Option<String>,
    /// Creation instant.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Scenario classification within a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    /// Expected to pass; measures capability.
    Golden,
    /// Expected to be blocked; measures containment.
    Kill,
}

/// One scored scenario of a suite.
///
/// # Invariants
/// - `scenario_id` is unique within the suite.
/// - `scenario_hash` is the canonical hash of `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier, unique within the suite.
    pub scenario_id: ScenarioId,
    /// Owning suite.
    pub suite_id: SuiteId,
    /// Deterministic iteration order within the suite.
    pub sequence_order: u32,
    /// Scenario classification.
    pub kind: ScenarioKind,
    /// Canonical hash of the scenario payload.
    pub scenario_hash: ContentHash,
    /// Scenario payload handed to the scorer.
    pub payload: Value,
}

/// Computes the manifest hash over ordered `(scenario_id, scenario_hash)`
/// pairs.
///
/// The pair list is taken in `sequence_order`; the hash is SHA-256 over its
/// RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn scenario_manifest_hash(scenarios: &[Scenario]) -> Result<ContentHash, HashError> {
    let pairs: Vec<(&str, &str)> = scenarios
        .iter()
        .map(|scenario| (scenario.scenario_id.as_str(), scenario.scenario_hash.as_str()))
        .collect();
    hash_canonical_json(&pairs)
}

// ============================================================================
// SECTION: Governance Actor
// ============================================================================

/// Role required for governance commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceRole {
    /// May approve suites for GA.
    CalibrationAdmin,
    /// May run validation and calibration commands.
    Operator,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Suite governance errors.
///
/// # Invariants
/// - `InvalidStatus` always names the failing `current_status` and the
///   `action_required` next step so operators can self-correct.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The suite is not in a status that permits this command.
    #[error("invalid suite status {current_status:?}; {action_required}")]
    InvalidStatus {
        /// Status the suite currently holds.
        current_status: SuiteStatus,
        /// Next step required before the command can succeed.
        action_required: String,
    },
    /// The command requires a frozen suite.
    #[error("suite {0} is not frozen")]
    SuiteNotFrozen(SuiteId),
    /// The scenario identifier already exists in the suite.
    #[error("duplicate scenario: {0}")]
    DuplicateScenario(ScenarioId),
    /// Inter-rater correlation fell below the gate.
    #[error("spearman rho {rho:.4} below required {required:.2}")]
    CorrelationTooLow {
        /// Computed Spearman rho.
        rho: f64,
        /// Required threshold.
        required: f64,
    },
    /// Too few evaluators for a calibration session.
    #[error("calibration requires at least {required} evaluators, got {provided}")]
    TooFewEvaluators {
        /// Evaluators provided.
        provided: usize,
        /// Minimum required.
        required: usize,
    },
    /// The actor's role does not permit the command.
    #[error("command requires role {required:?}")]
    Forbidden {
        /// Role the command requires.
        required: GovernanceRole,
    },
    /// An invite token expired.
    #[error("invite token expired")]
    TokenExpired,
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind label.
        kind: &'static str,
        /// Identifier that missed.
        id: String,
    },
    /// A submitted value failed validation.
    #[error("invalid governance input: {0}")]
    Invalid(String),
    /// The external scorer failed.
    #[error("scenario scorer failed: {0}")]
    ScorerFailed(String),
    /// Canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GovernanceError {
    /// Returns the stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidStatus {
                ..
            } => ErrorCode::InvalidStatus,
            Self::SuiteNotFrozen(_) => ErrorCode::SuiteNotFrozen,
            Self::DuplicateScenario(_) => ErrorCode::DuplicateScenario,
            Self::CorrelationTooLow {
                ..
            } => ErrorCode::CorrelationTooLow,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::Forbidden {
                ..
            } => ErrorCode::AuthorityInvarianceViolation,
            Self::TooFewEvaluators {
                ..
            }
            | Self::NotFound {
                ..
            }
            | Self::Invalid(_)
            | Self::ScorerFailed(_)
            | Self::Hash(_)
            | Self::Store(_) => ErrorCode::ValidationFailed,
        }
    }
}
