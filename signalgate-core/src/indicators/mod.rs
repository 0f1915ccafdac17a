//! Technical indicators and the per-timeframe indicator engine.
//!
//! Every indicator implements [`Indicator`]: bar history in, a series of the
//! same length out, with `f64::NAN` during warmup. The [`engine`] turns those
//! series into guarded latest readings; [`cross_check`] recomputes a subset
//! with independent single-pass formulas.
//!
//! Multi-output indicators (Bollinger, MACD, Stochastic) are exposed as one
//! instance per line, keeping the single-series trait unchanged.

pub mod atr;
pub mod bollinger;
pub mod cross_check;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod volume;

pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use cross_check::{cross_check, CrossCheckResult};
pub use ema::Ema;
pub use engine::{
    IndicatorEngine, IndicatorKind, IndicatorParams, IndicatorReading, IndicatorSet,
    InvalidIndicatorParams,
};
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use stochastic::{Stochastic, StochasticLine};
pub use volume::{Obv, VolumeSlope, VolumeTotal, Vpt};

use crate::domain::PriceBar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;

    /// Bars required for the latest value to be defined.
    fn required_bars(&self) -> usize {
        self.lookback() + 1
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000, hourly timestamps.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
