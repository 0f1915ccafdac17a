//! Volume-derived cumulative indicators.
//!
//! - OBV: running sum of volume signed by the close-to-close direction.
//! - VPT: running sum of volume * (close - prev_close) / prev_close.
//! - OBV / VPT slope: total[t] - total[t - period].
//!
//! A bar whose increment is undefined (non-finite input, non-positive previous
//! close) contributes nothing: the running total carries forward unchanged.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone, Default)]
pub struct Obv;

#[derive(Debug, Clone, Default)]
pub struct Vpt;

/// Which cumulative total a [`VolumeSlope`] differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTotal {
    Obv,
    Vpt,
}

#[derive(Debug, Clone)]
pub struct VolumeSlope {
    total: VolumeTotal,
    period: usize,
    name: String,
}

impl VolumeSlope {
    pub fn new(total: VolumeTotal, period: usize) -> Self {
        assert!(period >= 1, "volume slope period must be >= 1");
        let prefix = match total {
            VolumeTotal::Obv => "obv",
            VolumeTotal::Vpt => "vpt",
        };
        Self {
            total,
            period,
            name: format!("{prefix}_slope_{period}"),
        }
    }
}

/// Cumulative sum of per-bar increments, carrying the last total over undefined ones.
fn cumulate(bars: &[PriceBar], increment: impl Fn(&PriceBar, &PriceBar) -> f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(bars.len());
    if bars.is_empty() {
        return result;
    }
    let mut total = 0.0;
    result.push(total);
    for w in bars.windows(2) {
        let step = increment(&w[0], &w[1]);
        if step.is_finite() {
            total += step;
        }
        result.push(total);
    }
    result
}

pub fn on_balance_volume(bars: &[PriceBar]) -> Vec<f64> {
    cumulate(bars, |prev, bar| {
        let change = bar.close - prev.close;
        if change > 0.0 {
            bar.volume
        } else if change < 0.0 {
            -bar.volume
        } else if change == 0.0 {
            0.0
        } else {
            f64::NAN
        }
    })
}

pub fn volume_price_trend(bars: &[PriceBar]) -> Vec<f64> {
    cumulate(bars, |prev, bar| {
        if prev.close <= 0.0 {
            return f64::NAN;
        }
        bar.volume * (bar.close - prev.close) / prev.close
    })
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        on_balance_volume(bars)
    }
}

impl Indicator for Vpt {
    fn name(&self) -> &str {
        "vpt"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        volume_price_trend(bars)
    }
}

impl Indicator for VolumeSlope {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let totals = match self.total {
            VolumeTotal::Obv => on_balance_volume(bars),
            VolumeTotal::Vpt => volume_price_trend(bars),
        };
        (0..totals.len())
            .map(|i| {
                if i >= self.period {
                    totals[i] - totals[i - self.period]
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
