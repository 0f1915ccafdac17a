//! Tail risk metrics: VaR (three flavours), CVaR, skewness, kurtosis.
//!
//! All functions are pure: bar returns in, `Option` out. VaR and CVaR are
//! return quantiles, so a loss is negative (−0.025 = a 2.5% loss).

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::warn;

use signalgate_core::stats::{mean_f64, percentile_sorted, sorted_copy, std_dev};

/// Minimum number of return observations required for tail metrics.
/// Below this threshold, all Optional fields are None.
pub const MIN_RETURN_OBSERVATIONS: usize = 10;

const MIN_STD: f64 = 1e-15;

/// Tail statistics of one return series at one confidence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailMetrics {
    /// mean + z·σ with z the normal quantile of (1 − confidence).
    pub var_parametric: Option<f64>,
    /// Empirical (1 − confidence) quantile.
    pub var_historical: Option<f64>,
    /// Cornish-Fisher VaR, adjusting z for skew and excess kurtosis.
    pub var_modified: Option<f64>,
    /// Mean of the worst ⌈n·(1 − confidence)⌉ returns.
    pub cvar: Option<f64>,
    /// Third standardized moment. Negative = heavier left tail.
    pub skewness: Option<f64>,
    /// Fourth standardized moment minus 3. Positive = fatter than normal.
    pub excess_kurtosis: Option<f64>,
    pub confidence: f64,
    pub sample_size: usize,
}

/// Compute every tail metric for `returns` at `confidence` (e.g. 0.95).
pub fn compute_tail_metrics(returns: &[f64], confidence: f64) -> TailMetrics {
    let n = returns.len();
    let undefined = TailMetrics {
        var_parametric: None,
        var_historical: None,
        var_modified: None,
        cvar: None,
        skewness: None,
        excess_kurtosis: None,
        confidence,
        sample_size: n,
    };
    if n < MIN_RETURN_OBSERVATIONS || !(confidence > 0.0 && confidence < 1.0) {
        warn!(
            observations = n,
            confidence, "tail metrics undefined: too few returns or bad confidence"
        );
        return undefined;
    }
    if std_dev(returns) < MIN_STD {
        warn!(observations = n, "tail metrics undefined: zero return dispersion");
        return undefined;
    }

    TailMetrics {
        var_parametric: parametric_var(returns, confidence),
        var_historical: historical_var(returns, confidence),
        var_modified: modified_var(returns, confidence),
        cvar: cvar(returns, confidence),
        skewness: skewness(returns),
        excess_kurtosis: excess_kurtosis(returns),
        confidence,
        sample_size: n,
    }
}

// ─── Value at Risk ──────────────────────────────────────────────────

/// Gaussian VaR: mean + z·σ, z = Φ⁻¹(1 − confidence).
pub fn parametric_var(returns: &[f64], confidence: f64) -> Option<f64> {
    let std = std_dev(returns);
    if returns.len() < 2 || std < MIN_STD {
        return None;
    }
    let z = inverse_normal_cdf(1.0 - confidence)?;
    Some(mean_f64(returns) + z * std)
}

/// Empirical quantile of realized returns.
pub fn historical_var(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let sorted = sorted_copy(returns);
    Some(percentile_sorted(&sorted, (1.0 - confidence) * 100.0))
}

/// Cornish-Fisher expansion of the normal quantile:
///
/// q = z + (z² − 1)S/6 + (z³ − 3z)K/24 − (2z³ − 5z)S²/36
pub fn modified_var(returns: &[f64], confidence: f64) -> Option<f64> {
    let std = std_dev(returns);
    if returns.len() < 2 || std < MIN_STD {
        return None;
    }
    let z = inverse_normal_cdf(1.0 - confidence)?;
    let s = skewness(returns)?;
    let k = excess_kurtosis(returns)?;
    let q = z + (z * z - 1.0) * s / 6.0 + (z.powi(3) - 3.0 * z) * k / 24.0
        - (2.0 * z.powi(3) - 5.0 * z) * s * s / 36.0;
    let var = mean_f64(returns) + q * std;
    var.is_finite().then_some(var)
}

/// Conditional VaR: mean of the worst ⌈n·(1 − confidence)⌉ returns, at
/// least one observation.
pub fn cvar(returns: &[f64], confidence: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let sorted = sorted_copy(returns);
    // 1.0 - 0.95 is slightly above 0.05 in binary; trim before ceil.
    let tail_len = sorted.len() as f64 * (1.0 - confidence) - 1e-9;
    let cutoff = (tail_len.ceil().max(0.0) as usize).clamp(1, sorted.len());
    Some(mean_f64(&sorted[..cutoff]))
}

// ─── Distribution shape ─────────────────────────────────────────────

/// Skewness (third standardized moment).
///
/// skew = (1/n) * sum((x_i - mean)^3) / std^3
pub fn skewness(returns: &[f64]) -> Option<f64> {
    let std = std_dev(returns);
    if std < MIN_STD {
        return None;
    }
    let mean = mean_f64(returns);
    let m3 = returns
        .iter()
        .map(|r| ((r - mean) / std).powi(3))
        .sum::<f64>()
        / returns.len() as f64;
    Some(m3)
}

/// Excess kurtosis (fourth standardized moment minus 3).
///
/// kurt = (1/n) * sum((x_i - mean)^4) / std^4 - 3
pub fn excess_kurtosis(returns: &[f64]) -> Option<f64> {
    let std = std_dev(returns);
    if std < MIN_STD {
        return None;
    }
    let mean = mean_f64(returns);
    let m4 = returns
        .iter()
        .map(|r| ((r - mean) / std).powi(4))
        .sum::<f64>()
        / returns.len() as f64;
    Some(m4 - 3.0)
}

// ─── Normal quantile ────────────────────────────────────────────────

/// Inverse standard normal CDF. `None` outside (0, 1).
pub fn inverse_normal_cdf(p: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;
    let z = normal.inverse_cdf(p);
    z.is_finite().then_some(z)
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 0.01 * ((i as f64) * 0.9).sin() + if i % 17 == 0 { -0.04 } else { 0.0 })
            .collect()
    }

    #[test]
    fn inverse_normal_known_quantiles() {
        assert!((inverse_normal_cdf(0.5).unwrap()).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.05).unwrap() + 1.644_853_626_951).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.975).unwrap() - 1.959_963_984_540).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.001).unwrap() + 3.090_232_306_168).abs() < 1e-7);
        assert!(inverse_normal_cdf(0.0).is_none());
        assert!(inverse_normal_cdf(1.0).is_none());
    }

    #[test]
    fn insufficient_data_returns_none() {
        let tm = compute_tail_metrics(&[0.01, -0.02, 0.03], 0.95);
        assert!(tm.var_parametric.is_none());
        assert!(tm.cvar.is_none());
        assert!(tm.skewness.is_none());
        assert_eq!(tm.sample_size, 3);
    }

    #[test]
    fn zero_variance_returns_none() {
        let tm = compute_tail_metrics(&vec![0.002; 40], 0.95);
        assert!(tm.var_parametric.is_none());
        assert!(tm.var_historical.is_none());
        assert!(tm.var_modified.is_none());
        assert!(tm.cvar.is_none());
        assert_eq!(tm.sample_size, 40);
    }

    #[test]
    fn parametric_var_is_mean_plus_z_sigma() {
        let r = mixed_returns(200);
        let var = parametric_var(&r, 0.95).unwrap();
        let expected = mean_f64(&r) - 1.644_853_626_951 * std_dev(&r);
        assert!((var - expected).abs() < 1e-8);
        assert!(var < 0.0);
    }

    #[test]
    fn cvar_is_at_least_as_bad_as_historical_var() {
        let r = mixed_returns(200);
        let tm = compute_tail_metrics(&r, 0.95);
        assert!(tm.cvar.unwrap() <= tm.var_historical.unwrap());
    }

    #[test]
    fn cvar_of_known_values() {
        // 20 returns, worst 5% = 1 observation
        let mut r: Vec<f64> = (1..=19).map(|i| i as f64 * 0.001).collect();
        r.push(-0.05);
        assert!((cvar(&r, 0.95).unwrap() + 0.05).abs() < 1e-12);
        // 90% -> worst 2
        let c90 = cvar(&r, 0.90).unwrap();
        assert!((c90 - (-0.05 + 0.001) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn modified_equals_parametric_without_skew_or_kurtosis_terms() {
        // Symmetric two-point distribution: skew 0, excess kurtosis < 0.
        let r: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let s = skewness(&r).unwrap();
        assert!(s.abs() < 1e-9);
        let k = excess_kurtosis(&r).unwrap();
        let z = inverse_normal_cdf(0.05).unwrap();
        let expected = mean_f64(&r) + (z + (z.powi(3) - 3.0 * z) * k / 24.0) * std_dev(&r);
        assert!((modified_var(&r, 0.95).unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn crash_days_give_negative_skew() {
        let r = mixed_returns(200);
        assert!(skewness(&r).unwrap() < 0.0);
        assert!(excess_kurtosis(&r).unwrap().is_finite());
    }
}
