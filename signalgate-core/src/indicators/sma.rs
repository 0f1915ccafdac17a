//! Simple moving average over an arbitrary series.

/// Rolling mean over `period` values. Windows containing a non-finite value yield NaN.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            result[i] = window.iter().sum::<f64>() / period as f64;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_basic() {
        let result = sma_of_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_window() {
        let result = sma_of_series(&[f64::NAN, 1.0, 2.0, 3.0], 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 1.5, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_values() {
        assert!(sma_of_series(&[1.0], 5).iter().all(|v| v.is_nan()));
    }
}
