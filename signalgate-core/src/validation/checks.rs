//! Structural, price-logic, freshness and completeness checks.

use chrono::{DateTime, Utc};

use super::{CheckCategory, DataIssue, DataValidationConfig, FreshnessMode};
use crate::domain::OhlcvSeries;

/// Hard floor on the minimum bar count regardless of configuration.
pub const MIN_BARS_FLOOR: usize = 20;

/// Length, finiteness and timestamp ordering.
pub fn structural(series: &OhlcvSeries, config: &DataValidationConfig, out: &mut Vec<DataIssue>) {
    let min_bars = config.min_bars.max(MIN_BARS_FLOOR);
    if series.len() < min_bars {
        out.push(DataIssue::fatal(
            CheckCategory::Structural,
            format!("insufficient bars: {} < {min_bars}", series.len()),
        ));
    }

    if let Some(i) = series.bars.iter().position(|b| b.is_void()) {
        out.push(DataIssue::fatal(
            CheckCategory::Structural,
            format!("bar {i} has a missing or non-finite OHLCV value"),
        ));
    }

    if let Some(i) = series
        .bars
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        out.push(DataIssue::fatal(
            CheckCategory::Structural,
            format!(
                "timestamps not strictly increasing at bar {} ({} after {})",
                i + 1,
                series.bars[i + 1].timestamp,
                series.bars[i].timestamp
            ),
        ));
    }
}

/// Positive prices, OHLC ordering, non-negative volume, bounded bar-to-bar jumps.
pub fn price_logic(series: &OhlcvSeries, config: &DataValidationConfig, out: &mut Vec<DataIssue>) {
    for (i, bar) in series.bars.iter().enumerate() {
        if bar.open <= 0.0 || bar.high <= 0.0 || bar.low <= 0.0 || bar.close <= 0.0 {
            out.push(DataIssue::fatal(
                CheckCategory::PriceLogic,
                format!("bar {i} has a non-positive price"),
            ));
            // Ordering and jump checks are meaningless on non-positive prices.
            return;
        }
        if !bar.has_consistent_range() {
            out.push(DataIssue::fatal(
                CheckCategory::PriceLogic,
                format!(
                    "bar {i} violates OHLC ordering (o={}, h={}, l={}, c={})",
                    bar.open, bar.high, bar.low, bar.close
                ),
            ));
        }
        if bar.volume < 0.0 {
            out.push(DataIssue::fatal(
                CheckCategory::PriceLogic,
                format!("bar {i} has negative volume {}", bar.volume),
            ));
        }
    }

    for (i, w) in series.bars.windows(2).enumerate() {
        let jump = (w[1].close / w[0].close - 1.0).abs();
        if jump > config.max_bar_jump {
            out.push(DataIssue::fatal(
                CheckCategory::PriceLogic,
                format!(
                    "close jumped {:.1}% at bar {} (limit {:.0}%)",
                    jump * 100.0,
                    i + 1,
                    config.max_bar_jump * 100.0
                ),
            ));
        }
    }
}

/// The latest bar must have closed recently and no bar may lie in the future.
pub fn freshness(
    series: &OhlcvSeries,
    config: &DataValidationConfig,
    mode: FreshnessMode,
    now: DateTime<Utc>,
    out: &mut Vec<DataIssue>,
) {
    let (Some(last), Some(close_time)) = (series.bars.last(), series.last_close_time()) else {
        out.push(DataIssue::fatal(CheckCategory::Freshness, "series is empty"));
        return;
    };

    if last.timestamp > now + chrono::Duration::seconds(config.future_tolerance_secs) {
        out.push(DataIssue::fatal(
            CheckCategory::Freshness,
            format!("latest bar timestamp {} is in the future", last.timestamp),
        ));
        return;
    }

    let age = now - close_time;
    if age > mode.max_age() {
        out.push(DataIssue::fatal(
            CheckCategory::Freshness,
            format!(
                "stale data: latest bar closed {}s ago (limit {}s)",
                age.num_seconds(),
                mode.max_age().num_seconds()
            ),
        ));
    }
}

/// Missing bars (timestamp gaps) and frozen feeds.
pub fn completeness(series: &OhlcvSeries, config: &DataValidationConfig, out: &mut Vec<DataIssue>) {
    let step = series.timeframe.duration().num_seconds();
    let mut missing: i64 = 0;
    for w in series.bars.windows(2) {
        let gap = (w[1].timestamp - w[0].timestamp).num_seconds();
        if step > 0 && gap > step {
            missing += (gap as f64 / step as f64).round() as i64 - 1;
        }
    }
    if missing > 0 {
        let ratio = missing as f64 / (series.len() as i64 + missing) as f64;
        let message = format!(
            "{missing} missing bars ({:.1}% of expected)",
            ratio * 100.0
        );
        if ratio > config.max_missing_ratio {
            out.push(DataIssue::fatal(CheckCategory::Completeness, message));
        } else {
            out.push(DataIssue::warning(CheckCategory::Completeness, message));
        }
    }

    let frozen = longest_equal_close_run(series);
    if frozen >= config.max_frozen_run {
        out.push(DataIssue::fatal(
            CheckCategory::Completeness,
            format!("close frozen for {frozen} consecutive bars"),
        ));
    }
}

/// Length of the longest run of bars sharing an identical close.
fn longest_equal_close_run(series: &OhlcvSeries) -> usize {
    let mut best = usize::from(!series.is_empty());
    let mut current = best;
    for w in series.bars.windows(2) {
        if w[1].close == w[0].close {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
        }
    }
    best
}
