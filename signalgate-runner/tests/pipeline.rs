//! End-to-end analysis scenarios through the public `Analyzer` surface.

use chrono::{DateTime, TimeZone, Utc};
use signalgate_core::data::{
    series_from_closes, MarketDataProvider, NoPatterns, PatternRecognition, ProviderError,
    SyntheticSeries,
};
use signalgate_core::domain::{Direction, OhlcvSeries, PatternBias, Timeframe};
use signalgate_runner::{
    analyze, Action, AnalysisConfig, AnalysisError, AnalysisInput, AnalysisOutcome, Analyzer,
    FetchRequest, GateStage, PositionSizing, PriorAccuracyTable, StageOutcome,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

fn config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.monte_carlo.seed = Some(2024);
    config.monte_carlo.scenarios = 4_000;
    config
}

fn trending(up_fraction: f64, timeframes: &[Timeframe]) -> Vec<OhlcvSeries> {
    timeframes
        .iter()
        .map(|&tf| {
            SyntheticSeries::new("ETH/USDT", tf, now())
                .start_price(1_000.0)
                .move_unit(0.0005)
                .up_fraction(up_fraction)
                .seed(99)
                .generate()
        })
        .collect()
}

fn run(series: &[OhlcvSeries], pattern: PatternBias, balance: f64) -> AnalysisOutcome {
    let input = AnalysisInput {
        symbol: "ETH/USDT",
        series,
        pattern,
        balance,
    };
    analyze(&input, &config(), &PriorAccuracyTable::default(), now()).unwrap()
}

/// Properties every outcome must satisfy whatever the market did.
fn assert_consistent(outcome: &AnalysisOutcome, balance: f64) {
    let cfg = config();
    assert_eq!(outcome.validation.stages.len(), 6);
    assert!(outcome.validation.stages_passed <= 6);
    assert!(outcome.recommendation.confidence >= 0.0);
    assert!(outcome.recommendation.confidence <= 95.0);

    if let Some(fusion) = &outcome.fusion {
        let total = fusion.bullish_probability + fusion.bearish_probability;
        assert!((total - 1.0).abs() < 1e-9);
    }
    if let Some(mc) = &outcome.monte_carlo {
        assert!((0.0..=100.0).contains(&mc.profit_probability_pct));
        assert!(mc.p5_return_pct <= mc.median_return_pct);
        assert!(mc.median_return_pct <= mc.p95_return_pct);
    }

    let action = outcome.recommendation.action;
    if action.is_directional() {
        assert!(outcome.validation.execution_ready);
        let levels = outcome.recommendation.levels.unwrap();
        assert!(levels.is_ordered_for(action));
        assert!(levels.risk_reward >= cfg.signal.min_risk_reward - 1e-9);
    } else {
        assert!(outcome.recommendation.levels.is_none());
    }

    match &outcome.sizing {
        PositionSizing::Sized {
            risk_amount,
            position_value,
            ..
        } => {
            assert!(action.is_directional());
            assert!(*risk_amount <= balance * cfg.risk.risk_fraction * (1.0 + 1e-9));
            assert!(*position_value <= balance * cfg.risk.max_position_fraction * (1.0 + 1e-9));
        }
        PositionSizing::NotSized { .. } => {
            assert!(!outcome.validation.execution_ready || !action.is_directional());
        }
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn uptrend_never_recommends_short() {
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);

    assert!(outcome.data_verdicts.iter().all(|v| v.passed));
    let fusion = outcome.fusion.as_ref().unwrap();
    assert_eq!(fusion.direction, Direction::Bullish);
    assert!(fusion.sufficient_evidence);
    assert_eq!(fusion.timeframes_used, 2);
    assert!(outcome.risk_profile.is_some());
    assert!(outcome.monte_carlo.is_some());
    assert_ne!(outcome.recommendation.action, Action::Short);
    assert_consistent(&outcome, 10_000.0);
}

#[test]
fn agreeing_uptrend_reaches_a_sized_long() {
    let balance = 10_000.0;
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let outcome = run(&series, PatternBias::new(Direction::Bullish, 0.9), balance);

    assert!(
        outcome.validation.execution_ready,
        "{:?}",
        outcome.validation.blocks
    );
    assert_eq!(outcome.validation.stages_passed, 6);
    assert_eq!(outcome.validation.first_block(), None);
    assert_eq!(outcome.recommendation.action, Action::Long);
    assert!(outcome.recommendation.confidence >= config().signal.min_confidence);

    let PositionSizing::Sized {
        capped_size,
        risk_amount,
        ..
    } = outcome.sizing
    else {
        panic!("expected a sized long, got {:?}", outcome.sizing);
    };
    assert!(capped_size > 0.0);
    assert!(risk_amount > 0.0);
    assert!(risk_amount <= balance * config().risk.risk_fraction * (1.0 + 1e-9));
    assert_consistent(&outcome, balance);
}

#[test]
fn downtrend_never_recommends_long() {
    let series = trending(0.3, &[Timeframe::H1, Timeframe::H4]);
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);

    let fusion = outcome.fusion.as_ref().unwrap();
    assert_eq!(fusion.direction, Direction::Bearish);
    assert_ne!(outcome.recommendation.action, Action::Long);
    assert_consistent(&outcome, 10_000.0);
}

#[test]
fn conflicting_pattern_lowers_confidence() {
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let agree = run(
        &series,
        PatternBias::new(Direction::Bullish, 0.9),
        10_000.0,
    );
    let conflict = run(
        &series,
        PatternBias::new(Direction::Bearish, 0.9),
        10_000.0,
    );
    assert!(conflict.recommendation.confidence <= agree.recommendation.confidence);
    assert!(agree
        .recommendation
        .reasons
        .iter()
        .any(|r| r.starts_with("pattern agrees")));
    assert!(conflict
        .recommendation
        .reasons
        .iter()
        .any(|r| r.starts_with("pattern conflicts")));
    assert_consistent(&agree, 10_000.0);
    assert_consistent(&conflict, 10_000.0);
}

#[test]
fn single_timeframe_is_insufficient_evidence() {
    let series = trending(0.7, &[Timeframe::H1]);
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);

    let fusion = outcome.fusion.as_ref().unwrap();
    assert!(!fusion.sufficient_evidence);
    assert_eq!(outcome.recommendation.action, Action::Wait);
    assert!(outcome.risk_profile.is_none());
    assert!(outcome.monte_carlo.is_none());
    assert!(!outcome.validation.execution_ready);
    assert!(!outcome.sizing.is_sized());
    assert_consistent(&outcome, 10_000.0);
}

#[test]
fn linear_history_is_rejected_at_data_integrity() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    let series = vec![
        series_from_closes("ETH/USDT", Timeframe::H1, &closes, now()),
        series_from_closes("ETH/USDT", Timeframe::H4, &closes, now()),
    ];
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);

    assert_eq!(outcome.recommendation.action, Action::Wait);
    assert!(!outcome.validation.execution_ready);
    assert_eq!(outcome.validation.first_block(), Some(GateStage::DataIntegrity));
    assert!(matches!(
        outcome.validation.outcome(GateStage::DataIntegrity),
        Some(StageOutcome::Failed { .. })
    ));
    assert!(outcome.indicator_sets.is_empty());
    assert!(outcome
        .recommendation
        .reasons
        .iter()
        .any(|r| r.contains("data integrity")));
    assert_consistent(&outcome, 10_000.0);
}

#[test]
fn stale_history_waits() {
    let stale_end = now() - chrono::Duration::days(3);
    let series: Vec<OhlcvSeries> = [Timeframe::H1, Timeframe::H4]
        .into_iter()
        .map(|tf| SyntheticSeries::new("ETH/USDT", tf, stale_end).generate())
        .collect();
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);

    assert!(outcome.data_verdicts.iter().any(|v| !v.is_fresh()));
    assert_eq!(outcome.recommendation.action, Action::Wait);
    assert!(!outcome.validation.execution_ready);
}

#[test]
fn invalid_balance_is_rejected_up_front() {
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let input = AnalysisInput {
        symbol: "ETH/USDT",
        series: &series,
        pattern: PatternBias::neutral(),
        balance: f64::INFINITY,
    };
    let err = analyze(&input, &config(), &PriorAccuracyTable::default(), now()).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidBalance(_)));
}

#[test]
fn outcome_serializes_to_json() {
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let outcome = run(&series, PatternBias::neutral(), 10_000.0);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["symbol"], "ETH/USDT");
    assert!(json["validation"]["stages"].is_array());
    assert_eq!(json["config_fingerprint"].as_str().unwrap().len(), 64);
}

// ── Collaborators ────────────────────────────────────────────────────

struct ReplayProvider {
    series: Vec<OhlcvSeries>,
}

impl MarketDataProvider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<OhlcvSeries, ProviderError> {
        let found = self
            .series
            .iter()
            .find(|s| s.symbol == symbol && s.timeframe == timeframe)
            .ok_or_else(|| ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let skip = found.bars.len().saturating_sub(limit);
        let mut trimmed = found.clone();
        trimmed.bars.drain(..skip);
        Ok(trimmed)
    }
}

struct Offline;

impl MarketDataProvider for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch_series(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _limit: usize,
    ) -> Result<OhlcvSeries, ProviderError> {
        Err(ProviderError::NetworkUnreachable("connection refused".into()))
    }
}

struct AlwaysBullish;

impl PatternRecognition for AlwaysBullish {
    fn detect_pattern_bias(&self, _series: &OhlcvSeries) -> Result<PatternBias, ProviderError> {
        Ok(PatternBias::new(Direction::Bullish, 0.8))
    }
}

#[test]
fn fetch_and_analyze_matches_direct_analysis() {
    let analyzer = Analyzer::new(config()).unwrap();
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let provider = ReplayProvider {
        series: series.clone(),
    };
    let request = FetchRequest {
        symbol: "ETH/USDT",
        timeframes: &[Timeframe::H1, Timeframe::H4],
        limit: 1_000,
        balance: 5_000.0,
    };

    let fetched = analyzer
        .fetch_and_analyze(&provider, &AlwaysBullish, &request, now())
        .unwrap();
    let direct = analyzer
        .analyze(
            &AnalysisInput {
                symbol: "ETH/USDT",
                series: &series,
                pattern: PatternBias::new(Direction::Bullish, 0.8),
                balance: 5_000.0,
            },
            now(),
        )
        .unwrap();
    assert_eq!(fetched.recommendation, direct.recommendation);
    assert_eq!(fetched.monte_carlo, direct.monte_carlo);
    assert_consistent(&fetched, 5_000.0);
}

#[test]
fn fetch_and_analyze_surfaces_provider_failures() {
    let analyzer = Analyzer::new(config()).unwrap();
    let request = FetchRequest {
        symbol: "ETH/USDT",
        timeframes: &[Timeframe::H1],
        limit: 300,
        balance: 5_000.0,
    };
    let err = analyzer
        .fetch_and_analyze(&Offline, &NoPatterns, &request, now())
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Provider(ProviderError::NetworkUnreachable(_))
    ));
}

#[test]
fn analyzers_are_shared_across_threads() {
    let analyzer = Analyzer::new(config()).unwrap();
    let series = trending(0.7, &[Timeframe::H1, Timeframe::H4]);
    let input = AnalysisInput {
        symbol: "ETH/USDT",
        series: &series,
        pattern: PatternBias::neutral(),
        balance: 10_000.0,
    };
    let baseline = analyzer.analyze(&input, now()).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| analyzer.analyze(&input, now()).unwrap()))
            .collect();
        for handle in handles {
            let outcome = handle.join().unwrap();
            assert_eq!(outcome.recommendation, baseline.recommendation);
            assert_eq!(outcome.monte_carlo, baseline.monte_carlo);
        }
    });
}
