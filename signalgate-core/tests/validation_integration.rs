//! Integration tests for the integrity validator and indicator engine working
//! together on whole series.

use chrono::{DateTime, Duration, TimeZone, Utc};
use signalgate_core::data::{series_from_closes, SyntheticSeries};
use signalgate_core::domain::{OhlcvSeries, PriceBar, Timeframe};
use signalgate_core::indicators::{cross_check, IndicatorEngine, IndicatorKind, IndicatorParams};
use signalgate_core::validation::{
    CheckCategory, DataValidationConfig, DataValidator, FreshnessMode, Severity,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

fn realistic(timeframe: Timeframe) -> OhlcvSeries {
    SyntheticSeries::new("SOL/USDT", timeframe, now())
        .bars(250)
        .seed(42)
        .generate()
}

fn fatal_categories(series: &OhlcvSeries) -> Vec<CheckCategory> {
    DataValidator::default()
        .validate(series, now())
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Fatal)
        .map(|i| i.category)
        .collect()
}

#[test]
fn realistic_series_validates_and_yields_valid_indicators() {
    for tf in [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1] {
        let series = realistic(tf);
        let verdict = DataValidator::default().validate(&series, now());
        assert!(verdict.passed, "{tf}: {:?}", verdict.issues);

        let params = IndicatorParams::default();
        let set = IndicatorEngine::new(params.clone()).compute(&series);
        assert!(set.is_valid(), "{tf}: {:?}", set.anomalies());
        assert!(cross_check(&series, &set, &params, 1e-9)
            .iter()
            .all(|r| r.passed));
    }
}

#[test]
fn negative_price_fails_price_logic() {
    let mut series = realistic(Timeframe::H1);
    series.bars[100].low = -1.0;
    assert_eq!(fatal_categories(&series), vec![CheckCategory::PriceLogic]);
}

#[test]
fn inverted_bar_fails_price_logic() {
    let mut series = realistic(Timeframe::H1);
    let bar = &mut series.bars[50];
    std::mem::swap(&mut bar.high, &mut bar.low);
    assert_eq!(fatal_categories(&series), vec![CheckCategory::PriceLogic]);
}

#[test]
fn nan_volume_fails_structural() {
    let mut series = realistic(Timeframe::H1);
    series.bars[10].volume = f64::NAN;
    assert_eq!(fatal_categories(&series), vec![CheckCategory::Structural]);
}

#[test]
fn out_of_order_timestamps_fail_structural() {
    let mut series = realistic(Timeframe::H1);
    series.bars.swap(20, 21);
    assert!(fatal_categories(&series).contains(&CheckCategory::Structural));
}

#[test]
fn fifty_percent_jump_fails() {
    let mut series = realistic(Timeframe::H1);
    let last = series.bars.len() - 1;
    let close = series.bars[last - 1].close * 1.8;
    let bar: &mut PriceBar = &mut series.bars[last];
    bar.close = close;
    bar.high = close * 1.01;
    assert_eq!(fatal_categories(&series), vec![CheckCategory::PriceLogic]);
}

#[test]
fn stale_series_fails_freshness_in_both_modes() {
    let series = realistic(Timeframe::H1);
    let later = now() + Duration::hours(2);
    for mode in [FreshnessMode::Strict, FreshnessMode::Normal] {
        let verdict = DataValidator::new(DataValidationConfig::default(), mode).validate(&series, later);
        assert!(!verdict.passed);
        assert!(!verdict.is_fresh());
        assert_eq!(verdict.age_secs, Some(7200));
    }
}

#[test]
fn future_bar_fails_freshness() {
    let series = realistic(Timeframe::H1);
    let earlier = now() - Duration::hours(3);
    let verdict = DataValidator::default().validate(&series, earlier);
    assert!(!verdict.passed);
    assert!(verdict
        .issues
        .iter()
        .any(|i| i.is_fatal() && i.category == CheckCategory::Freshness));
}

#[test]
fn frozen_closes_fail_completeness() {
    let mut series = realistic(Timeframe::H1);
    let frozen = series.bars[200].close;
    for bar in &mut series.bars[200..212] {
        bar.open = frozen;
        bar.close = frozen;
        bar.high = bar.high.max(frozen);
        bar.low = bar.low.min(frozen);
    }
    let verdict = DataValidator::default().validate(&series, now());
    assert!(!verdict.passed, "{:?}", verdict.issues);
    assert!(verdict
        .issues
        .iter()
        .any(|i| i.is_fatal() && i.category == CheckCategory::Completeness));
}

#[test]
fn gapped_series_fails_completeness() {
    let mut series = realistic(Timeframe::H1);
    // Drop 30 of 250 bars: 12% missing.
    series.bars.drain(100..130);
    let verdict = DataValidator::default().validate(&series, now());
    assert!(!verdict.passed);
    assert!(verdict
        .issues
        .iter()
        .any(|i| i.is_fatal() && i.category == CheckCategory::Completeness));
}

#[test]
fn linear_series_is_rejected_even_with_plausible_ohlc() {
    let closes: Vec<f64> = (0..60).map(|i| 2_000.0 + 3.5 * i as f64).collect();
    let series = series_from_closes("ETH/USDT", Timeframe::H1, &closes, now());
    assert!(series.bars.iter().all(PriceBar::is_sane));

    let verdict = DataValidator::default().validate(&series, now());
    assert!(!verdict.passed);
    assert!(verdict
        .issues
        .iter()
        .any(|i| i.is_fatal() && i.category == CheckCategory::Anomaly));

    // The engine still reads it as maximally overbought; it is the validator
    // that must stop it.
    let set = IndicatorEngine::default().compute(&series);
    assert!((set.value(IndicatorKind::Rsi).unwrap() - 100.0).abs() < 1e-9);
}
