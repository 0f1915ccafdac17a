//! Validation gate: six ordered circuit-breaker stages over the assembled
//! analysis.
//!
//! Every stage always runs and records an outcome. A stage whose inputs were
//! never produced (the pipeline short-circuited upstream) is `Skipped`, which
//! counts as not passed. The recommendation is executable only when all six
//! stages pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use signalgate_core::indicators::{CrossCheckResult, IndicatorReading, IndicatorSet};
use signalgate_core::validation::DataVerdict;

use crate::config::{GateConfig, SignalConfig};
use crate::fusion::FusionResult;
use crate::monte_carlo::MonteCarloResult;
use crate::recommendation::Recommendation;
use crate::risk_profile::RiskProfile;

/// Slack on the risk/reward floor for levels computed in floating point.
const RISK_REWARD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    DataIntegrity,
    IndicatorValidity,
    SignalValidity,
    CrossVerification,
    RiskThresholds,
    FinalSanity,
}

impl GateStage {
    pub const ALL: [GateStage; 6] = [
        GateStage::DataIntegrity,
        GateStage::IndicatorValidity,
        GateStage::SignalValidity,
        GateStage::CrossVerification,
        GateStage::RiskThresholds,
        GateStage::FinalSanity,
    ];

    pub fn letter(self) -> char {
        match self {
            GateStage::DataIntegrity => 'A',
            GateStage::IndicatorValidity => 'B',
            GateStage::SignalValidity => 'C',
            GateStage::CrossVerification => 'D',
            GateStage::RiskThresholds => 'E',
            GateStage::FinalSanity => 'F',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GateStage::DataIntegrity => "data integrity",
            GateStage::IndicatorValidity => "indicator validity",
            GateStage::SignalValidity => "signal validity",
            GateStage::CrossVerification => "cross-verification",
            GateStage::RiskThresholds => "risk thresholds",
            GateStage::FinalSanity => "final sanity",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.letter(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Passed,
    Failed { reasons: Vec<String> },
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, StageOutcome::Passed)
    }

    fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            StageOutcome::Passed
        } else {
            StageOutcome::Failed { reasons }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: GateStage,
    pub outcome: StageOutcome,
}

/// Aggregated gate verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub stages: Vec<StageRecord>,
    pub stages_passed: usize,
    /// One line per failed or skipped stage reason.
    pub blocks: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
    pub execution_ready: bool,
}

impl ValidationReport {
    pub fn outcome(&self, stage: GateStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn first_block(&self) -> Option<GateStage> {
        self.stages
            .iter()
            .find(|r| !r.outcome.passed())
            .map(|r| r.stage)
    }
}

/// Everything the stages may inspect.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub verdicts: &'a [DataVerdict],
    pub sets: &'a [IndicatorSet],
    pub cross_checks: &'a [CrossCheckResult],
    pub fusion: Option<&'a FusionResult>,
    pub recommendation: &'a Recommendation,
    pub risk: Option<&'a RiskProfile>,
    pub monte_carlo: Option<&'a MonteCarloResult>,
    /// Primary ATR divided by the primary close.
    pub atr_ratio: Option<f64>,
}

type StageCheck = fn(&ValidationGate, &GateContext<'_>) -> StageOutcome;

const STAGES: [(GateStage, StageCheck); 6] = [
    (GateStage::DataIntegrity, ValidationGate::data_integrity),
    (GateStage::IndicatorValidity, ValidationGate::indicator_validity),
    (GateStage::SignalValidity, ValidationGate::signal_validity),
    (GateStage::CrossVerification, ValidationGate::cross_verification),
    (GateStage::RiskThresholds, ValidationGate::risk_thresholds),
    (GateStage::FinalSanity, ValidationGate::final_sanity),
];

#[derive(Debug, Clone, Default)]
pub struct ValidationGate {
    signal: SignalConfig,
    gate: GateConfig,
}

impl ValidationGate {
    pub fn new(signal: SignalConfig, gate: GateConfig) -> Self {
        Self { signal, gate }
    }

    pub fn evaluate(&self, ctx: &GateContext<'_>) -> ValidationReport {
        let mut stages = Vec::with_capacity(STAGES.len());
        let mut blocks = Vec::new();

        for (stage, check) in STAGES {
            let outcome = check(self, ctx);
            match &outcome {
                StageOutcome::Passed => debug!(stage = %stage, "gate stage passed"),
                StageOutcome::Failed { reasons } => {
                    for reason in reasons {
                        warn!(stage = %stage, reason = %reason, "gate stage blocked");
                        blocks.push(format!("{stage}: {reason}"));
                    }
                }
                StageOutcome::Skipped { reason } => {
                    debug!(stage = %stage, reason = %reason, "gate stage skipped");
                    blocks.push(format!("{stage}: skipped ({reason})"));
                }
            }
            stages.push(StageRecord { stage, outcome });
        }

        let stages_passed = stages.iter().filter(|r| r.outcome.passed()).count();
        ValidationReport {
            execution_ready: stages_passed == STAGES.len(),
            stages_passed,
            blocks,
            warnings: self.warnings(ctx),
            stages,
        }
    }

    // ─── Stages ─────────────────────────────────────────────────────

    fn data_integrity(&self, ctx: &GateContext<'_>) -> StageOutcome {
        if ctx.verdicts.is_empty() {
            return StageOutcome::Failed {
                reasons: vec!["no series were validated".to_string()],
            };
        }
        let reasons = ctx
            .verdicts
            .iter()
            .flat_map(|v| {
                v.failures()
                    .into_iter()
                    .map(move |msg| format!("{} {}: {msg}", v.symbol, v.timeframe))
            })
            .collect();
        StageOutcome::from_reasons(reasons)
    }

    fn indicator_validity(&self, ctx: &GateContext<'_>) -> StageOutcome {
        if ctx.sets.is_empty() {
            return StageOutcome::Skipped {
                reason: "no indicator sets computed".to_string(),
            };
        }
        let mut reasons = Vec::new();
        for set in ctx.sets.iter().filter(|s| !s.is_valid()) {
            let detail: Vec<String> = set
                .readings
                .iter()
                .filter_map(|(kind, reading)| match reading {
                    IndicatorReading::Value(_) => None,
                    IndicatorReading::InsufficientData {
                        required,
                        available,
                    } => Some(format!("{kind} needs {required} bars, has {available}")),
                    IndicatorReading::Anomalous { reason, .. } => {
                        Some(format!("{kind} anomalous: {reason}"))
                    }
                })
                .collect();
            reasons.push(format!(
                "{} indicators invalid ({})",
                set.timeframe,
                detail.join("; ")
            ));
        }
        if ctx.cross_checks.is_empty() {
            reasons.push("no indicator could be cross-checked".to_string());
        }
        for check in ctx.cross_checks.iter().filter(|c| !c.passed) {
            reasons.push(format!(
                "{} cross-check mismatch: engine {:.6} vs reference {:.6}",
                check.kind, check.engine_value, check.reference_value
            ));
        }
        StageOutcome::from_reasons(reasons)
    }

    fn signal_validity(&self, ctx: &GateContext<'_>) -> StageOutcome {
        let rec = ctx.recommendation;
        let mut reasons = Vec::new();
        if !rec.action.is_directional() {
            reasons.push(format!("action {} is not executable", rec.action));
        }
        if !(rec.confidence.is_finite() && (0.0..=100.0).contains(&rec.confidence)) {
            reasons.push(format!("confidence {} outside [0, 100]", rec.confidence));
        }
        if rec.action.is_directional() {
            match rec.levels {
                Some(levels) if levels.is_ordered_for(rec.action) => {}
                Some(levels) => reasons.push(format!(
                    "price levels inconsistent with {}: stop {} entry {} target {}",
                    rec.action, levels.stop_loss, levels.entry, levels.take_profit
                )),
                None => reasons.push("directional action without price levels".to_string()),
            }
        }
        StageOutcome::from_reasons(reasons)
    }

    fn cross_verification(&self, ctx: &GateContext<'_>) -> StageOutcome {
        let Some(fusion) = ctx.fusion else {
            return StageOutcome::Skipped {
                reason: "no fusion result".to_string(),
            };
        };
        let direction = ctx.recommendation.direction;
        let probabilities: Vec<f64> = fusion
            .per_timeframe
            .iter()
            .filter(|tf| tf.valid)
            .map(|tf| tf.probability_of(direction) * 100.0)
            .collect();
        if probabilities.is_empty() {
            return StageOutcome::Skipped {
                reason: "no valid timeframe to compare".to_string(),
            };
        }

        let mut reasons = Vec::new();
        let confidence_spread = spread(&probabilities);
        if confidence_spread >= self.gate.max_confidence_spread {
            reasons.push(format!(
                "timeframe confidence spread {confidence_spread:.1} points (limit {:.1})",
                self.gate.max_confidence_spread
            ));
        }

        let closes: Vec<f64> = ctx.sets.iter().filter_map(|s| s.last_close).collect();
        if !closes.is_empty() {
            let mean = closes.iter().sum::<f64>() / closes.len() as f64;
            let price_spread = if mean > 0.0 {
                spread(&closes) / mean
            } else {
                f64::INFINITY
            };
            if price_spread >= self.gate.max_price_spread {
                reasons.push(format!(
                    "latest close differs by {:.2}% across timeframes (limit {:.2}%)",
                    price_spread * 100.0,
                    self.gate.max_price_spread * 100.0
                ));
            }
        }
        StageOutcome::from_reasons(reasons)
    }

    fn risk_thresholds(&self, ctx: &GateContext<'_>) -> StageOutcome {
        let rec = ctx.recommendation;
        let mut reasons = Vec::new();
        if rec.confidence.is_nan() || rec.confidence < self.signal.min_confidence {
            reasons.push(format!(
                "confidence {:.1} below {:.1}",
                rec.confidence, self.signal.min_confidence
            ));
        }
        match rec.risk_reward() {
            Some(rr) if rr >= self.signal.min_risk_reward - RISK_REWARD_EPSILON => {}
            Some(rr) => reasons.push(format!(
                "risk/reward {rr:.2} below {:.2}",
                self.signal.min_risk_reward
            )),
            None => reasons.push("no risk/reward available".to_string()),
        }
        let timeframes = ctx.fusion.map_or(0, |f| f.timeframes_used);
        if timeframes < self.signal.min_timeframes {
            reasons.push(format!(
                "{timeframes} valid timeframe(s), need {}",
                self.signal.min_timeframes
            ));
        }
        if ctx.verdicts.is_empty() {
            reasons.push("data freshness unknown".to_string());
        }
        for verdict in ctx.verdicts.iter().filter(|v| !v.is_fresh()) {
            reasons.push(format!(
                "{} {} data is stale (age {:?}s)",
                verdict.symbol, verdict.timeframe, verdict.age_secs
            ));
        }
        StageOutcome::from_reasons(reasons)
    }

    fn final_sanity(&self, ctx: &GateContext<'_>) -> StageOutcome {
        let rec = ctx.recommendation;
        let mut reasons = Vec::new();
        if !rec.confidence.is_finite() {
            reasons.push("confidence is not finite".to_string());
        }
        match rec.levels {
            Some(levels) if levels.is_finite() => {}
            Some(_) => reasons.push("price levels are not finite".to_string()),
            None => reasons.push("price levels missing".to_string()),
        }
        match ctx.monte_carlo {
            Some(mc) if mc.is_finite() => {}
            Some(_) => reasons.push("monte carlo output is not finite".to_string()),
            None => reasons.push("monte carlo result missing".to_string()),
        }
        match ctx.risk {
            Some(risk) => {
                for field in risk.non_finite_fields() {
                    reasons.push(format!("risk metric {field} is not finite"));
                }
            }
            None => reasons.push("risk profile missing".to_string()),
        }
        if ctx.fusion.is_none() {
            reasons.push("fusion result missing".to_string());
        }
        StageOutcome::from_reasons(reasons)
    }

    // ─── Warnings ───────────────────────────────────────────────────

    fn warnings(&self, ctx: &GateContext<'_>) -> Vec<String> {
        let rec = ctx.recommendation;
        let mut warnings: Vec<String> = ctx
            .verdicts
            .iter()
            .flat_map(|v| {
                v.warnings()
                    .into_iter()
                    .map(move |msg| format!("{} {}: {msg}", v.symbol, v.timeframe))
            })
            .collect();

        if rec.confidence > self.gate.warn_confidence_above {
            warnings.push(format!("confidence {:.1} is unusually high", rec.confidence));
        }
        if let Some(rr) = rec.risk_reward() {
            if rr > self.gate.warn_risk_reward_above {
                warnings.push(format!("risk/reward {rr:.2} is unusually high"));
            }
        }
        if ctx.sets.len() == 1 {
            warnings.push("single-timeframe analysis".to_string());
        }
        if let Some(ratio) = ctx.atr_ratio {
            if ratio > self.gate.high_volatility_ratio {
                warnings.push(format!(
                    "high-volatility regime: ATR is {:.1}% of price",
                    ratio * 100.0
                ));
            }
        }
        warnings
    }
}

fn spread(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}
