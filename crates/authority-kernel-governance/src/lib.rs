// crates/authority-kernel-governance/src/lib.rs
// ============================================================================
// Module: Authority Kernel Governance Library
// Description: Public API surface for suite governance.
// Purpose: Expose the suite lifecycle, validation runs, and calibration.
// Dependencies: crate::{calibration, engine, stats, store, suite, validation}
// ============================================================================

//! ## Overview
//! Suite governance gates promotion of a reasoning configuration to
//! production: DRAFT suites freeze into immutable scenario manifests, system
//! validation runs score them against machine thresholds, human calibration
//! sessions gate on inter-rater correlation, and a calibration admin signs
//! off GA approval. All commands flow through [`engine::GovernanceEngine`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod calibration;
pub mod engine;
pub mod stats;
pub mod store;
pub mod suite;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use calibration::CalibrationSession;
pub use calibration::EvaluatorInvite;
pub use calibration::HumanScore;
pub use calibration::InviteStatus;
pub use calibration::PursueDecision;
pub use calibration::ScoreSubmission;
pub use calibration::SessionStatus;
pub use calibration::seeded_shuffle;
pub use engine::GovernanceEngine;
pub use store::BusinessEvent;
pub use store::GovernanceStore;
pub use store::InMemoryGovernanceStore;
pub use suite::CORRELATION_THRESHOLD;
pub use suite::DEFAULT_SCORING_FAN_OUT;
pub use suite::GOLDEN_PASS_THRESHOLD;
pub use suite::GovernanceError;
pub use suite::GovernanceRole;
pub use suite::KILL_CONTAINMENT_THRESHOLD;
pub use suite::MIN_EVALUATORS;
pub use suite::Scenario;
pub use suite::ScenarioKind;
pub use suite::Suite;
pub use suite::SuiteStatus;
pub use suite::scenario_manifest_hash;
pub use validation::CRS_WEIGHTS;
pub use validation::DimensionScores;
pub use validation::RunParams;
pub use validation::RunStatus;
pub use validation::ScenarioOutcome;
pub use validation::ScenarioResult;
pub use validation::ScenarioScorer;
pub use validation::ScoredScenario;
pub use validation::ScorerError;
pub use validation::ValidationRun;
