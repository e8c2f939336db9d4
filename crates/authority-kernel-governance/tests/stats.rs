// crates/authority-kernel-governance/tests/stats.rs
// ============================================================================
// Module: Governance Statistics Tests
// Description: Correlation, agreement, effect-size, and CRS weighting checks.
// ============================================================================
//! ## Overview
//! Known-value and degenerate-input checks for the statistics behind the
//! governance gates, plus the fixed CRS weight vocabulary.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use authority_kernel_governance::CRS_WEIGHTS;
use authority_kernel_governance::DimensionScores;
use authority_kernel_governance::stats::average_ranks;
use authority_kernel_governance::stats::cohens_d;
use authority_kernel_governance::stats::icc2_1;
use authority_kernel_governance::stats::mean;
use authority_kernel_governance::stats::pearson;
use authority_kernel_governance::stats::spearman_rho;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn uniform_scores(score: f64) -> DimensionScores {
    DimensionScores {
        qualification: score,
        needs_discovery: score,
        value_articulation: score,
        objection_handling: score,
        process_adherence: score,
        compliance: score,
        relationship_building: score,
        next_step_secured: score,
    }
}

// ============================================================================
// SECTION: Rank Correlation
// ============================================================================

#[test]
fn monotone_series_correlate_perfectly() {
    let xs = [0.1, 0.4, 0.5, 0.9];
    let ys = [1.0, 2.0, 3.0, 4.0];
    let rho = spearman_rho(&xs, &ys).expect("rho");
    assert!((rho - 1.0).abs() < 1e-12);
}

#[test]
fn inverted_series_correlate_negatively() {
    let xs = [0.1, 0.4, 0.5, 0.9];
    let ys = [4.0, 3.0, 2.0, 1.0];
    let rho = spearman_rho(&xs, &ys).expect("rho");
    assert!((rho + 1.0).abs() < 1e-12);
}

#[test]
fn ties_share_average_ranks() {
    let ranks = average_ranks(&[2.0, 1.0, 2.0, 3.0]);
    assert_eq!(ranks, vec![2.5, 1.0, 2.5, 4.0]);
}

#[test]
fn nonlinear_but_monotone_data_still_ranks_perfectly() {
    let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
    let ys = [1.0, 8.0, 27.0, 64.0, 125.0];
    let rho = spearman_rho(&xs, &ys).expect("rho");
    assert!((rho - 1.0).abs() < 1e-12);
    let r = pearson(&xs, &ys).expect("pearson");
    assert!(r < 1.0, "pearson is below 1 for nonlinear data");
}

#[test]
fn constant_series_has_no_correlation() {
    assert!(spearman_rho(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    assert!(spearman_rho(&[1.0], &[1.0]).is_none());
}

// ============================================================================
// SECTION: Effect Size
// ============================================================================

#[test]
fn cohens_d_matches_hand_computation() {
    // Means 4 and 2, pooled variance 1 -> d = 2.
    let golden = [3.0, 4.0, 5.0];
    let kill = [1.0, 2.0, 3.0];
    let effect = cohens_d(&golden, &kill).expect("effect");
    assert!((effect - 2.0).abs() < 1e-12);
}

#[test]
fn cohens_d_requires_variance() {
    assert!(cohens_d(&[1.0, 1.0], &[1.0, 1.0]).is_none());
    assert!(cohens_d(&[1.0], &[2.0, 3.0]).is_none());
}

// ============================================================================
// SECTION: Intraclass Correlation
// ============================================================================

#[test]
fn identical_raters_agree_perfectly() {
    let matrix = vec![
        vec![1.0, 1.0],
        vec![2.0, 2.0],
        vec![3.0, 3.0],
        vec![4.0, 4.0],
    ];
    let icc = icc2_1(&matrix).expect("icc");
    assert!((icc - 1.0).abs() < 1e-9);
}

#[test]
fn disagreeing_raters_score_below_agreement() {
    let matrix = vec![
        vec![1.0, 4.0],
        vec![2.0, 1.0],
        vec![3.0, 2.0],
        vec![4.0, 3.0],
    ];
    let icc = icc2_1(&matrix).expect("icc");
    assert!(icc < 1.0);
}

#[test]
fn icc_rejects_degenerate_shapes() {
    assert!(icc2_1(&[]).is_none());
    assert!(icc2_1(&[vec![1.0, 2.0]]).is_none());
    assert!(icc2_1(&[vec![1.0], vec![2.0]]).is_none());
}

// ============================================================================
// SECTION: Weighted CRS
// ============================================================================

#[test]
fn crs_weights_sum_to_one() {
    let total: f64 = CRS_WEIGHTS.iter().map(|(_, weight)| weight).sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn perfect_scores_yield_unit_crs() {
    let crs = uniform_scores(5.0).weighted_crs();
    assert!((crs - 1.0).abs() < 1e-12);
}

#[test]
fn floor_scores_yield_one_fifth_crs() {
    let crs = uniform_scores(1.0).weighted_crs();
    assert!((crs - 0.2).abs() < 1e-12);
}

#[test]
fn scores_outside_range_are_invalid() {
    assert!(uniform_scores(3.0).is_valid());
    assert!(!uniform_scores(0.5).is_valid());
    assert!(!uniform_scores(5.5).is_valid());
}

#[test]
fn mean_of_empty_input_is_none() {
    assert!(mean(&[]).is_none());
}
