// crates/authority-kernel-governance/src/stats.rs
// ============================================================================
// Module: Governance Statistics
// Description: Rank correlation, agreement, and effect-size computations.
// Purpose: Compute the numeric gates of suite governance deterministically.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! Spearman rho (with average ranks on ties) gates human calibration,
//! ICC(2,1) is stored as the secondary agreement measure, and Cohen's d
//! summarizes golden-versus-kill CRS separation in validation runs. All
//! functions return `None` when the inputs cannot support the statistic
//! rather than producing NaN.

// ============================================================================
// SECTION: Moments
// ============================================================================

/// Arithmetic mean; `None` for empty input.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let count = usize_to_f64(values.len());
    Some(values.iter().sum::<f64>() / count)
}

/// Unbiased sample variance; `None` below two observations.
#[must_use]
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let count = usize_to_f64(values.len());
    let sum_sq = values.iter().map(|value| (value - mu).powi(2)).sum::<f64>();
    Some(sum_sq / (count - 1.0))
}

// ============================================================================
// SECTION: Correlation
// ============================================================================

/// Pearson correlation; `None` when either side has zero variance.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

/// Average ranks (1-based) with ties sharing their mean rank.
#[must_use]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0 .. values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));
    let mut ranks = vec![0.0; values.len()];
    let mut index = 0;
    while index < order.len() {
        let mut tie_end = index;
        while tie_end + 1 < order.len() && values[order[tie_end + 1]] == values[order[index]] {
            tie_end += 1;
        }
        let shared = (usize_to_f64(index) + usize_to_f64(tie_end)) / 2.0 + 1.0;
        for position in index ..= tie_end {
            ranks[order[position]] = shared;
        }
        index = tie_end + 1;
    }
    ranks
}

/// Spearman rank correlation: Pearson over average ranks.
#[must_use]
pub fn spearman_rho(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

// ============================================================================
// SECTION: Effect Size
// ============================================================================

/// Cohen's d with pooled standard deviation; `None` when either sample has
/// fewer than two observations or the pooled variance is zero.
#[must_use]
pub fn cohens_d(sample_a: &[f64], sample_b: &[f64]) -> Option<f64> {
    let mean_a = mean(sample_a)?;
    let mean_b = mean(sample_b)?;
    let var_a = sample_variance(sample_a)?;
    let var_b = sample_variance(sample_b)?;
    let n_a = usize_to_f64(sample_a.len());
    let n_b = usize_to_f64(sample_b.len());
    let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0);
    if pooled <= 0.0 {
        return None;
    }
    Some((mean_a - mean_b) / pooled.sqrt())
}

// ============================================================================
// SECTION: Intraclass Correlation
// ============================================================================

/// ICC(2,1): two-way random effects, absolute agreement, single measures.
///
/// `matrix` is subjects by raters; every row must have the same length.
/// Returns `None` below two subjects or two raters, or when the denominator
/// degenerates.
#[must_use]
pub fn icc2_1(matrix: &[Vec<f64>]) -> Option<f64> {
    let n = matrix.len();
    let k = matrix.first().map_or(0, Vec::len);
    if n < 2 || k < 2 || matrix.iter().any(|row| row.len() != k) {
        return None;
    }
    let n_f = usize_to_f64(n);
    let k_f = usize_to_f64(k);
    let grand = matrix.iter().flatten().sum::<f64>() / (n_f * k_f);
    let row_means: Vec<f64> = matrix.iter().map(|row| row.iter().sum::<f64>() / k_f).collect();
    let col_means: Vec<f64> = (0 .. k)
        .map(|col| matrix.iter().map(|row| row[col]).sum::<f64>() / n_f)
        .collect();

    let ss_rows = k_f * row_means.iter().map(|value| (value - grand).powi(2)).sum::<f64>();
    let ss_cols = n_f * col_means.iter().map(|value| (value - grand).powi(2)).sum::<f64>();
    let ss_total = matrix.iter().flatten().map(|value| (value - grand).powi(2)).sum::<f64>();
    let ss_error = ss_total - ss_rows - ss_cols;

    let ms_rows = ss_rows / (n_f - 1.0);
    let ms_cols = ss_cols / (k_f - 1.0);
    let ms_error = ss_error / ((n_f - 1.0) * (k_f - 1.0));

    let denominator =
        ms_rows + (k_f - 1.0) * ms_error + k_f * (ms_cols - ms_error) / n_f;
    if denominator == 0.0 {
        return None;
    }
    Some((ms_rows - ms_error) / denominator)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a collection length to `f64` without truncation lints.
fn usize_to_f64(value: usize) -> f64 {
    // Collection lengths in governance stay far below 2^52.
    u32::try_from(value).map_or(f64::MAX, f64::from)
}
