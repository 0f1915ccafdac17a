//! Independent recomputation of engine readings.
//!
//! RSI and ATR are recomputed here with single-pass streaming formulas that
//! share no code with the indicator implementations, then compared with the
//! engine's latest values. A mismatch means one of the two paths is wrong.

use serde::Serialize;
use tracing::warn;

use super::engine::{IndicatorKind, IndicatorParams, IndicatorSet};
use crate::domain::OhlcvSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossCheckResult {
    pub kind: IndicatorKind,
    pub engine_value: f64,
    pub reference_value: f64,
    pub passed: bool,
}

/// Compare the engine's RSI and ATR with a reference recompute.
///
/// Only indicators with a usable engine value and a defined reference are
/// compared. `tolerance` is relative to max(1, |reference|).
pub fn cross_check(
    series: &OhlcvSeries,
    set: &IndicatorSet,
    params: &IndicatorParams,
    tolerance: f64,
) -> Vec<CrossCheckResult> {
    let references = [
        (IndicatorKind::Rsi, reference_rsi(series, params.rsi_period)),
        (IndicatorKind::Atr, reference_atr(series, params.atr_period)),
    ];

    let mut results = Vec::new();
    for (kind, reference) in references {
        let (Some(engine_value), Some(reference_value)) = (set.value(kind), reference) else {
            continue;
        };
        let scale = reference_value.abs().max(1.0);
        let passed = (engine_value - reference_value).abs() <= tolerance * scale;
        if !passed {
            warn!(
                symbol = %series.symbol,
                indicator = %kind,
                engine_value,
                reference_value,
                "indicator cross-check mismatch"
            );
        }
        results.push(CrossCheckResult {
            kind,
            engine_value,
            reference_value,
            passed,
        });
    }
    results
}

/// Streaming Wilder RSI over closes.
fn reference_rsi(series: &OhlcvSeries, period: usize) -> Option<f64> {
    if period == 0 || series.len() <= period {
        return None;
    }
    let n = period as f64;
    let (mut gain, mut loss) = (0.0, 0.0);
    let mut prev = series.bars[0].close;
    for (i, bar) in series.bars.iter().enumerate().skip(1) {
        let change = bar.close - prev;
        prev = bar.close;
        if !change.is_finite() {
            return None;
        }
        let (up, down) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        if i <= period {
            gain += up / n;
            loss += down / n;
        } else {
            gain = (gain * (n - 1.0) + up) / n;
            loss = (loss * (n - 1.0) + down) / n;
        }
    }
    Some(match (gain > 0.0, loss > 0.0) {
        (false, false) => 50.0,
        (true, false) => 100.0,
        (false, true) => 0.0,
        (true, true) => 100.0 * gain / (gain + loss),
    })
}

/// Streaming Wilder ATR, seeded from bars 1..=period.
fn reference_atr(series: &OhlcvSeries, period: usize) -> Option<f64> {
    if period == 0 || series.len() <= period {
        return None;
    }
    let n = period as f64;
    let mut atr = 0.0;
    for (i, pair) in series.bars.windows(2).enumerate() {
        let (prev_close, bar) = (pair[0].close, &pair[1]);
        if !(bar.high.is_finite() && bar.low.is_finite() && prev_close.is_finite()) {
            return None;
        }
        let up_reach = (bar.high - prev_close).abs();
        let down_reach = (bar.low - prev_close).abs();
        let tr = (bar.high - bar.low).max(up_reach).max(down_reach);
        if i < period {
            atr += tr / n;
        } else {
            atr = (atr * (n - 1.0) + tr) / n;
        }
    }
    Some(atr)
}
