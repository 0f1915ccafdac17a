//! The per-symbol analysis pipeline.
//!
//! validate → indicators → fusion → risk → recommendation → gate → sizing
//!
//! `analyze` is pure given `now` and a fixed Monte Carlo seed: no I/O, no
//! shared mutable state. `Analyzer` adds the process-wide prior table and a
//! cached config fingerprint so one instance can serve many symbols from
//! many threads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use signalgate_core::data::{MarketDataProvider, PatternRecognition};
use signalgate_core::domain::{Direction, OhlcvSeries, PatternBias, Timeframe};
use signalgate_core::indicators::{
    cross_check, CrossCheckResult, IndicatorEngine, IndicatorKind, IndicatorSet,
};
use signalgate_core::rng::RngHierarchy;
use signalgate_core::validation::{DataValidator, DataVerdict, FreshnessMode};

use crate::config::{AnalysisConfig, ConfigError};
use crate::error::AnalysisError;
use crate::fusion::{FusionResult, SignalFusion};
use crate::gate::{GateContext, ValidationGate, ValidationReport};
use crate::monte_carlo::MonteCarloResult;
use crate::priors::{PriorAccuracyTable, PriorStore};
use crate::recommendation::{Recommendation, RecommendationSynthesizer, SynthesisInput};
use crate::risk_profile::{RiskAnalytics, RiskProfile};
use crate::sizing::{PositionSizer, PositionSizing};

/// One symbol's inputs. The first series is the primary (entry) timeframe.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub symbol: &'a str,
    pub series: &'a [OhlcvSeries],
    pub pattern: PatternBias,
    /// Account balance in quote currency.
    pub balance: f64,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub symbol: String,
    pub analyzed_at: DateTime<Utc>,
    pub recommendation: Recommendation,
    /// Absent when the pipeline stopped before risk analytics.
    pub risk_profile: Option<RiskProfile>,
    /// Absent when the pipeline stopped early or history was too short.
    pub monte_carlo: Option<MonteCarloResult>,
    pub validation: ValidationReport,
    pub sizing: PositionSizing,
    pub fusion: Option<FusionResult>,
    pub data_verdicts: Vec<DataVerdict>,
    pub indicator_sets: Vec<IndicatorSet>,
    pub cross_checks: Vec<CrossCheckResult>,
    pub config_fingerprint: String,
    pub prior_version: u64,
}

/// Analyze one symbol.
///
/// Data problems, weak evidence and gate blocks come back inside the
/// outcome. Only an invalid configuration or balance is an error.
pub fn analyze(
    input: &AnalysisInput<'_>,
    config: &AnalysisConfig,
    priors: &PriorAccuracyTable,
    now: DateTime<Utc>,
) -> Result<AnalysisOutcome, AnalysisError> {
    config.validate()?;
    let fingerprint = config.fingerprint()?;
    run(input, config, &fingerprint, priors, now)
}

fn check_balance(balance: f64) -> Result<(), AnalysisError> {
    if balance.is_finite() && balance > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidBalance(balance))
    }
}

fn run(
    input: &AnalysisInput<'_>,
    config: &AnalysisConfig,
    fingerprint: &str,
    priors: &PriorAccuracyTable,
    now: DateTime<Utc>,
) -> Result<AnalysisOutcome, AnalysisError> {
    check_balance(input.balance)?;

    let validator = DataValidator::new(
        config.data.clone(),
        FreshnessMode::from_strict(config.strict_freshness),
    );
    let verdicts: Vec<DataVerdict> = input
        .series
        .iter()
        .map(|s| validator.validate(s, now))
        .collect();

    let gate = ValidationGate::new(config.signal.clone(), config.gate.clone());
    let sizer = PositionSizer::new(config.risk.clone());

    // Any failed series short-circuits to WAIT before indicators run.
    let data_failures: Vec<String> = verdicts
        .iter()
        .flat_map(|v| {
            v.failures()
                .into_iter()
                .map(move |msg| format!("{} {}: {msg}", v.symbol, v.timeframe))
        })
        .collect();
    if input.series.is_empty() || !data_failures.is_empty() {
        let mut reasons = vec!["data integrity checks failed".to_string()];
        if input.series.is_empty() {
            reasons.push("no series supplied".to_string());
        }
        reasons.extend(data_failures);
        warn!(
            symbol = input.symbol,
            failures = reasons.len() - 1,
            "data integrity failed; recommending WAIT"
        );
        let recommendation = Recommendation::wait(Direction::Neutral, 0.0, reasons);
        let validation = gate.evaluate(&GateContext {
            verdicts: &verdicts,
            sets: &[],
            cross_checks: &[],
            fusion: None,
            recommendation: &recommendation,
            risk: None,
            monte_carlo: None,
            atr_ratio: None,
        });
        let sizing = sizer.size(&recommendation, &validation, None, input.balance);
        return Ok(finish(
            input,
            now,
            fingerprint,
            priors,
            Parts {
                recommendation,
                risk_profile: None,
                monte_carlo: None,
                validation,
                sizing,
                fusion: None,
                data_verdicts: verdicts,
                indicator_sets: Vec::new(),
                cross_checks: Vec::new(),
            },
        ));
    }

    let engine = IndicatorEngine::new(config.indicators.clone());
    let sets: Vec<IndicatorSet> = input.series.iter().map(|s| engine.compute(s)).collect();
    let cross_checks: Vec<CrossCheckResult> = input
        .series
        .iter()
        .zip(&sets)
        .flat_map(|(series, set)| {
            cross_check(
                series,
                set,
                engine.params(),
                config.gate.cross_check_tolerance,
            )
        })
        .collect();

    let fusion =
        SignalFusion::new(config.signal.min_timeframes).fuse(&sets, &input.pattern, priors);

    let primary = &input.series[0];
    let primary_set = &sets[0];
    let atr = primary_set.value(IndicatorKind::Atr);
    let last_close = primary_set.last_close;

    let (risk_profile, monte_carlo) = if fusion.sufficient_evidence {
        let analytics = RiskAnalytics::new(config.risk.clone(), config.monte_carlo.clone());
        let hierarchy = config
            .monte_carlo
            .seed
            .map_or_else(RngHierarchy::from_entropy, RngHierarchy::new);
        (
            Some(analytics.assess(primary)),
            analytics.simulate(primary, &hierarchy),
        )
    } else {
        (None, None)
    };

    let recommendation =
        RecommendationSynthesizer::new(config.signal.clone()).synthesize(SynthesisInput {
            fusion: &fusion,
            pattern: &input.pattern,
            risk: risk_profile.as_ref(),
            monte_carlo: monte_carlo.as_ref(),
            atr,
            last_close,
        });

    let atr_ratio = match (atr, last_close) {
        (Some(atr), Some(close)) if close > 0.0 => Some(atr / close),
        _ => None,
    };
    let validation = gate.evaluate(&GateContext {
        verdicts: &verdicts,
        sets: &sets,
        cross_checks: &cross_checks,
        fusion: Some(&fusion),
        recommendation: &recommendation,
        risk: risk_profile.as_ref(),
        monte_carlo: monte_carlo.as_ref(),
        atr_ratio,
    });

    let recommendation = match validation.first_block() {
        Some(stage) if recommendation.action.is_directional() => {
            recommendation.vetoed(format!("validation gate blocked at stage {stage}"))
        }
        _ => recommendation,
    };
    let sizing = sizer.size(
        &recommendation,
        &validation,
        risk_profile.as_ref(),
        input.balance,
    );

    Ok(finish(
        input,
        now,
        fingerprint,
        priors,
        Parts {
            recommendation,
            risk_profile,
            monte_carlo,
            validation,
            sizing,
            fusion: Some(fusion),
            data_verdicts: verdicts,
            indicator_sets: sets,
            cross_checks,
        },
    ))
}

struct Parts {
    recommendation: Recommendation,
    risk_profile: Option<RiskProfile>,
    monte_carlo: Option<MonteCarloResult>,
    validation: ValidationReport,
    sizing: PositionSizing,
    fusion: Option<FusionResult>,
    data_verdicts: Vec<DataVerdict>,
    indicator_sets: Vec<IndicatorSet>,
    cross_checks: Vec<CrossCheckResult>,
}

fn finish(
    input: &AnalysisInput<'_>,
    now: DateTime<Utc>,
    fingerprint: &str,
    priors: &PriorAccuracyTable,
    parts: Parts,
) -> AnalysisOutcome {
    info!(
        symbol = input.symbol,
        action = %parts.recommendation.action,
        confidence = parts.recommendation.confidence,
        execution_ready = parts.validation.execution_ready,
        stages_passed = parts.validation.stages_passed,
        "analysis complete"
    );
    AnalysisOutcome {
        symbol: input.symbol.to_string(),
        analyzed_at: now,
        recommendation: parts.recommendation,
        risk_profile: parts.risk_profile,
        monte_carlo: parts.monte_carlo,
        validation: parts.validation,
        sizing: parts.sizing,
        fusion: parts.fusion,
        data_verdicts: parts.data_verdicts,
        indicator_sets: parts.indicator_sets,
        cross_checks: parts.cross_checks,
        config_fingerprint: fingerprint.to_string(),
        prior_version: priors.version(),
    }
}

/// What `Analyzer::fetch_and_analyze` should fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub symbol: &'a str,
    /// Primary timeframe first.
    pub timeframes: &'a [Timeframe],
    /// Bars per timeframe.
    pub limit: usize,
    pub balance: f64,
}

/// Validated configuration plus the shared prior table.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalysisConfig,
    fingerprint: String,
    priors: PriorStore,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::with_priors(config, PriorAccuracyTable::default())
    }

    pub fn with_priors(
        config: AnalysisConfig,
        priors: PriorAccuracyTable,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        Ok(Self {
            config,
            fingerprint,
            priors: PriorStore::new(priors),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn config_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn priors(&self) -> &PriorStore {
        &self.priors
    }

    /// Analyze against a snapshot of the prior table taken at call start.
    pub fn analyze(
        &self,
        input: &AnalysisInput<'_>,
        now: DateTime<Utc>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let priors = self.priors.snapshot();
        run(input, &self.config, &self.fingerprint, &priors, now)
    }

    pub fn analyze_now(&self, input: &AnalysisInput<'_>) -> Result<AnalysisOutcome, AnalysisError> {
        self.analyze(input, Utc::now())
    }

    /// Validate and merge new accuracy rates. Returns the new table version;
    /// on error the table is unchanged.
    pub fn update_prior_accuracies<I, K>(&self, rates: I) -> Result<u64, ConfigError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        self.priors.update(rates).map(|table| table.version())
    }

    /// Fetch every requested timeframe, ask the pattern collaborator about
    /// the primary series, then analyze.
    ///
    /// Provider failures are errors. A pattern-recognition failure only
    /// drops the pattern evidence.
    pub fn fetch_and_analyze(
        &self,
        provider: &dyn MarketDataProvider,
        patterns: &dyn PatternRecognition,
        request: &FetchRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        check_balance(request.balance)?;
        let series = request
            .timeframes
            .iter()
            .map(|&tf| provider.fetch_series(request.symbol, tf, request.limit))
            .collect::<Result<Vec<_>, _>>()?;

        let pattern = match series.first() {
            Some(primary) => patterns.detect_pattern_bias(primary).unwrap_or_else(|err| {
                warn!(
                    symbol = request.symbol,
                    provider = provider.name(),
                    error = %err,
                    "pattern recognition failed; continuing without pattern evidence"
                );
                PatternBias::neutral()
            }),
            None => PatternBias::neutral(),
        };

        self.analyze(
            &AnalysisInput {
                symbol: request.symbol,
                series: &series,
                pattern,
                balance: request.balance,
            },
            now,
        )
    }
}
