//! Benford's-Law first-digit test.
//!
//! Naturally occurring magnitudes that span several orders of magnitude have
//! leading digit d with probability log10(1 + 1/d). Fabricated sequences
//! (evenly spaced prices, copy-pasted moves) do not. The statistic is a
//! chi-square goodness-of-fit with 8 degrees of freedom.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Nine digit classes, one constraint (the total).
const DEGREES_OF_FREEDOM: f64 = 8.0;

/// Result of a Benford goodness-of-fit test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenfordResult {
    /// Number of leading digits observed (zeros and non-finite values are skipped).
    pub sample_size: usize,
    /// Observed count per digit 1..=9 (index 0 is digit 1).
    pub observed: [usize; 9],
    pub chi_square: f64,
    pub p_value: f64,
}

/// Expected share of leading digit `d` (1..=9).
pub fn expected_share(d: u8) -> f64 {
    (1.0 + 1.0 / d as f64).log10()
}

/// First significant digit of |value|. `None` for zero, NaN or infinity.
///
/// Works for any magnitude: 0.456 → 4, -123 → 1, 1e-10 → 1.
pub fn first_digit(value: f64) -> Option<u8> {
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    // Scientific formatting always starts with the leading significant digit.
    let formatted = format!("{:e}", value.abs());
    formatted
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .filter(|&d| d >= 1)
        .map(|d| d as u8)
}

/// Run the chi-square test over the leading digits of `values`.
///
/// Returns `None` when fewer than `min_digits` usable digits remain or the
/// statistic has no defined p-value.
pub fn benford_test(values: &[f64], min_digits: usize) -> Option<BenfordResult> {
    let mut observed = [0usize; 9];
    let mut n = 0usize;
    for d in values.iter().filter_map(|&v| first_digit(v)) {
        observed[(d - 1) as usize] += 1;
        n += 1;
    }
    if n == 0 || n < min_digits {
        return None;
    }

    let chi_square: f64 = (1..=9u8)
        .map(|d| {
            let expected = n as f64 * expected_share(d);
            let diff = observed[(d - 1) as usize] as f64 - expected;
            diff * diff / expected
        })
        .sum();

    Some(BenfordResult {
        sample_size: n,
        observed,
        chi_square,
        p_value: chi_square_sf(chi_square)?,
    })
}

/// Upper-tail probability of the 8-dof chi-square distribution.
fn chi_square_sf(statistic: f64) -> Option<f64> {
    if statistic.is_nan() {
        return None;
    }
    let dist = ChiSquared::new(DEGREES_OF_FREEDOM).ok()?;
    Some(dist.sf(statistic.max(0.0)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_digit_of_decimals() {
        assert_eq!(first_digit(0.456), Some(4));
        assert_eq!(first_digit(0.789), Some(7));
        assert_eq!(first_digit(0.001), Some(1));
        assert_eq!(first_digit(0.999), Some(9));
    }

    #[test]
    fn first_digit_skips_zero_and_non_finite() {
        assert_eq!(first_digit(0.0), None);
        assert_eq!(first_digit(-0.0), None);
        assert_eq!(first_digit(f64::NAN), None);
        assert_eq!(first_digit(f64::INFINITY), None);
    }

    #[test]
    fn first_digit_uses_absolute_value() {
        assert_eq!(first_digit(-123.0), Some(1));
        assert_eq!(first_digit(-456.0), Some(4));
        assert_eq!(first_digit(-0.789), Some(7));
    }

    #[test]
    fn first_digit_of_extreme_magnitudes() {
        assert_eq!(first_digit(1e-10), Some(1));
        assert_eq!(first_digit(1e10), Some(1));
        assert_eq!(first_digit(9876.543), Some(9));
        assert_eq!(first_digit(1000.0), Some(1));
    }

    #[test]
    fn expected_shares_sum_to_one() {
        let total: f64 = (1..=9).map(expected_share).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn chi_square_sf_matches_tables() {
        // Critical values for 8 dof: 15.507 at 0.05, 20.090 at 0.01.
        assert!((chi_square_sf(15.507).unwrap() - 0.05).abs() < 1e-3);
        assert!((chi_square_sf(20.090).unwrap() - 0.01).abs() < 1e-3);
        assert!((chi_square_sf(0.0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(chi_square_sf(f64::NAN), None);
    }

    #[test]
    fn benford_sample_passes() {
        // Log-uniform magnitudes across four decades follow Benford's law.
        let values: Vec<f64> = (0..1000)
            .map(|i| 10f64.powf(4.0 * (i as f64 + 0.5) / 1000.0))
            .collect();
        let result = benford_test(&values, 15).unwrap();
        assert_eq!(result.sample_size, 1000);
        assert!(result.p_value > 0.05, "p = {}", result.p_value);
    }

    #[test]
    fn identical_moves_fail() {
        let values = vec![0.5; 19];
        let result = benford_test(&values, 15).unwrap();
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn too_few_digits_is_inconclusive() {
        assert!(benford_test(&[1.0, 2.0, 0.0], 15).is_none());
    }
}
