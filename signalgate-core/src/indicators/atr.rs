//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the Wilder-smoothed true range (alpha = 1/period), seeded with the
//! mean of the first `period` true ranges that have a previous close.
//! Lookback: period.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// True Range series. TR[0] is high - low (no previous close).
///
/// Any non-finite input yields NaN for that bar (`f64::max` would silently drop it).
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    let mut tr: Vec<f64> = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        tr.push(first.high - first.low);
    }
    tr.extend(bars.windows(2).map(|w| {
        let (prev, bar) = (&w[0], &w[1]);
        if !(bar.high.is_finite() && bar.low.is_finite() && prev.close.is_finite()) {
            return f64::NAN;
        }
        (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs())
    }));
    tr
}

/// Wilder smoothing starting at `start`: seed = mean of `values[start..start+period]`,
/// then value = alpha * x + (1 - alpha) * prev. A non-finite input ends the series.
pub fn wilder_smooth(values: &[f64], period: usize, start: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < start + period {
        return result;
    }

    let seed_window = &values[start..start + period];
    if seed_window.iter().any(|v| !v.is_finite()) {
        return result;
    }
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    result[start + period - 1] = prev;

    let alpha = 1.0 / period as f64;
    for i in (start + period)..n {
        if !values[i].is_finite() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        // TR[0] lacks a previous close, so the seed window starts at bar 1.
        wilder_smooth(&true_range(bars), self.period, 1)
    }
}
