//! Statistical anomaly checks: extreme returns, volume spikes, synthetic-looking
//! sequences and the Benford first-digit test.

use super::benford::benford_test;
use super::{CheckCategory, DataIssue, DataValidationConfig};
use crate::domain::OhlcvSeries;
use crate::stats::{mean_f64, percentile_sorted, sorted_copy, std_dev};

/// Relative tolerance when comparing consecutive steps for equality.
const STEP_EQUALITY_TOLERANCE: f64 = 1e-9;

/// Run every anomaly check, appending issues to `out`.
pub fn statistical_anomalies(
    series: &OhlcvSeries,
    config: &DataValidationConfig,
    out: &mut Vec<DataIssue>,
) {
    let returns = series.close_returns();
    let outliers = z_score_outliers(&returns, config.z_score_threshold);
    if !outliers.is_empty() {
        out.push(DataIssue::warning(
            CheckCategory::Anomaly,
            format!(
                "{} returns beyond {}σ (first at bar {})",
                outliers.len(),
                config.z_score_threshold,
                outliers[0] + 1
            ),
        ));
    }

    let volumes: Vec<f64> = series.bars.iter().map(|b| b.volume).collect();
    let spikes = volume_spikes(&volumes, config.volume_iqr_multiplier);
    if !spikes.is_empty() {
        out.push(DataIssue::warning(
            CheckCategory::Anomaly,
            format!("{} volume spikes above Q3 + {}×IQR", spikes.len(), config.volume_iqr_multiplier),
        ));
    }

    let steps: Vec<f64> = series
        .bars
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .collect();

    let arithmetic = longest_arithmetic_run(&steps);
    if arithmetic >= config.max_arithmetic_run {
        out.push(DataIssue::fatal(
            CheckCategory::Anomaly,
            format!("{arithmetic} identical consecutive price steps: sequence looks synthetic"),
        ));
    }

    let monotone = longest_monotone_run(&steps);
    if monotone >= config.monotone_run_warning {
        out.push(DataIssue::warning(
            CheckCategory::Anomaly,
            format!("closes moved in one direction for {monotone} consecutive bars"),
        ));
    }

    let window_start = steps.len().saturating_sub(config.benford_window);
    if let Some(result) = benford_test(&steps[window_start..], config.benford_min_digits) {
        if result.p_value < config.benford_alpha {
            let summary = format!(
                "price moves violate Benford's law (chi2={:.2}, p={:.2e} < {})",
                result.chi_square, result.p_value, config.benford_alpha
            );
            // Fatal only next to another synthetic-data signal.
            let corroborated = arithmetic >= config.benford_corroborating_run
                || monotone >= config.monotone_run_warning;
            if corroborated {
                out.push(DataIssue::fatal(
                    CheckCategory::Anomaly,
                    format!("{summary}: data may be fabricated"),
                ));
            } else {
                out.push(DataIssue::warning(
                    CheckCategory::Anomaly,
                    format!("{summary} without other synthetic-data signals"),
                ));
            }
        }
    }
}

/// Indices of values further than `threshold` sample standard deviations from the mean.
///
/// Empty when the series has no dispersion.
pub fn z_score_outliers(values: &[f64], threshold: f64) -> Vec<usize> {
    let std = std_dev(values);
    if std < 1e-15 {
        return Vec::new();
    }
    let mean = mean_f64(values);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((**v - mean) / std).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Indices of values above Q3 + k·IQR. Empty when the IQR is zero.
pub fn volume_spikes(volumes: &[f64], k: f64) -> Vec<usize> {
    if volumes.len() < 4 {
        return Vec::new();
    }
    let sorted = sorted_copy(volumes);
    let q1 = percentile_sorted(&sorted, 25.0);
    let q3 = percentile_sorted(&sorted, 75.0);
    let iqr = q3 - q1;
    if iqr <= 0.0 {
        return Vec::new();
    }
    let fence = q3 + k * iqr;
    volumes
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > fence)
        .map(|(i, _)| i)
        .collect()
}

/// Longest run of identical non-zero steps (an arithmetic progression of closes).
pub fn longest_arithmetic_run(steps: &[f64]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for (i, &step) in steps.iter().enumerate() {
        if step == 0.0 {
            current = 0;
            continue;
        }
        let same_as_prev = i > 0 && {
            let prev = steps[i - 1];
            (step - prev).abs() <= STEP_EQUALITY_TOLERANCE * step.abs().max(prev.abs())
        };
        current = if same_as_prev { current + 1 } else { 1 };
        best = best.max(current);
    }
    best
}

/// Longest run of consecutive closes moving strictly in one direction, in bars.
pub fn longest_monotone_run(steps: &[f64]) -> usize {
    let mut best = 0;
    let mut current = 0;
    let mut last_sign = 0.0;
    for &step in steps {
        let sign = if step > 0.0 {
            1.0
        } else if step < 0.0 {
            -1.0
        } else {
            0.0
        };
        current = if sign != 0.0 && sign == last_sign {
            current + 1
        } else if sign != 0.0 {
            1
        } else {
            0
        };
        last_sign = sign;
        best = best.max(current);
    }
    // n steps in one direction span n + 1 bars.
    if best > 0 {
        best + 1
    } else {
        0
    }
}
