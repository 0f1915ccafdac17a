//! Naive Bayesian fusion of indicator and pattern evidence.
//!
//! Each directional reading is an independent Bernoulli witness whose
//! likelihood is its historical accuracy. Witnesses are combined as a sum of
//! log-odds starting from even odds, then mapped back to a probability.

use serde::{Deserialize, Serialize};
use tracing::debug;

use signalgate_core::domain::{Direction, PatternBias, Timeframe};
use signalgate_core::indicators::{IndicatorKind, IndicatorSet};

use crate::priors::{EvidenceSource, PriorAccuracyTable};

const MIN_LIKELIHOOD: f64 = 0.01;
const MAX_LIKELIHOOD: f64 = 0.99;

/// Strength of the dominant side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    /// WEAK below 0.60, STRONG above 0.75, MODERATE in between.
    pub fn from_probability(dominant: f64) -> Self {
        if dominant > 0.75 {
            SignalStrength::Strong
        } else if dominant >= 0.60 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

/// One directional witness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// `None` for evidence that is not tied to a timeframe (patterns).
    pub timeframe: Option<Timeframe>,
    pub source: EvidenceSource,
    pub direction: Direction,
    pub likelihood: f64,
}

impl Evidence {
    fn log_odds(&self) -> f64 {
        let l = self.likelihood.clamp(MIN_LIKELIHOOD, MAX_LIKELIHOOD);
        (l / (1.0 - l)).ln() * self.direction.sign()
    }
}

/// Fused view of one timeframe's indicator evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeFusion {
    pub timeframe: Timeframe,
    /// Whether the timeframe's indicator set was complete and guard-clean.
    pub valid: bool,
    pub bullish_probability: f64,
    pub evidence_count: usize,
}

impl TimeframeFusion {
    pub fn probability_of(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Bearish => 1.0 - self.bullish_probability,
            _ => self.bullish_probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub bullish_probability: f64,
    pub bearish_probability: f64,
    pub strength: SignalStrength,
    pub direction: Direction,
    /// Timeframes whose indicator sets were valid.
    pub timeframes_used: usize,
    pub per_timeframe: Vec<TimeframeFusion>,
    pub evidence: Vec<Evidence>,
    pub evidence_count: usize,
    pub prior_version: u64,
    /// False when fewer than the required timeframes were valid; downstream
    /// must not act on the probabilities.
    pub sufficient_evidence: bool,
}

impl FusionResult {
    pub fn dominant_probability(&self) -> f64 {
        self.bullish_probability.max(self.bearish_probability)
    }

    pub fn probability_of(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Bullish => self.bullish_probability,
            Direction::Bearish => self.bearish_probability,
            Direction::Neutral => self.dominant_probability(),
        }
    }
}

/// Combines evidence across timeframes.
#[derive(Debug, Clone)]
pub struct SignalFusion {
    min_timeframes: usize,
}

impl Default for SignalFusion {
    fn default() -> Self {
        Self { min_timeframes: 2 }
    }
}

impl SignalFusion {
    pub fn new(min_timeframes: usize) -> Self {
        Self { min_timeframes }
    }

    /// Fuse every usable reading in `sets` plus the pattern bias.
    ///
    /// Readings that are neutral, insufficient or anomalous are skipped. The
    /// pattern counts once, its likelihood shrunk toward 0.5 by its confidence.
    pub fn fuse(
        &self,
        sets: &[IndicatorSet],
        pattern: &PatternBias,
        priors: &PriorAccuracyTable,
    ) -> FusionResult {
        let mut evidence = Vec::new();
        let mut per_timeframe = Vec::with_capacity(sets.len());

        for set in sets {
            let witnesses = timeframe_evidence(set, priors);
            let log_odds: f64 = witnesses.iter().map(Evidence::log_odds).sum();
            per_timeframe.push(TimeframeFusion {
                timeframe: set.timeframe,
                valid: set.is_valid(),
                bullish_probability: sigmoid(log_odds),
                evidence_count: witnesses.len(),
            });
            evidence.extend(witnesses);
        }

        if pattern.is_informative() {
            let prior = priors.accuracy(EvidenceSource::Pattern);
            evidence.push(Evidence {
                timeframe: None,
                source: EvidenceSource::Pattern,
                direction: pattern.direction,
                likelihood: 0.5 + (prior - 0.5) * pattern.confidence,
            });
        }

        let log_odds: f64 = evidence.iter().map(Evidence::log_odds).sum();
        let bullish_probability = sigmoid(log_odds);
        let bearish_probability = 1.0 - bullish_probability;
        let direction = if log_odds > 0.0 {
            Direction::Bullish
        } else if log_odds < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };
        let timeframes_used = sets.iter().filter(|s| s.is_valid()).count();
        let sufficient_evidence = timeframes_used >= self.min_timeframes;

        let result = FusionResult {
            bullish_probability,
            bearish_probability,
            strength: SignalStrength::from_probability(
                bullish_probability.max(bearish_probability),
            ),
            direction,
            timeframes_used,
            per_timeframe,
            evidence_count: evidence.len(),
            evidence,
            prior_version: priors.version(),
            sufficient_evidence,
        };
        debug!(
            bullish = result.bullish_probability,
            direction = ?result.direction,
            strength = ?result.strength,
            timeframes_used,
            evidence = result.evidence_count,
            sufficient_evidence,
            "signal fusion complete"
        );
        result
    }
}

/// Directional witnesses from one timeframe's readings.
fn timeframe_evidence(set: &IndicatorSet, priors: &PriorAccuracyTable) -> Vec<Evidence> {
    let above = |value: Option<f64>, pivot: Option<f64>| match (value, pivot) {
        (Some(v), Some(p)) if v > p => Some(Direction::Bullish),
        (Some(v), Some(p)) if v < p => Some(Direction::Bearish),
        _ => None,
    };

    // OBV and VPT slopes share one volume vote, withheld when they disagree.
    let volume = match (
        above(set.value(IndicatorKind::ObvSlope), Some(0.0)),
        above(set.value(IndicatorKind::VptSlope), Some(0.0)),
    ) {
        (Some(obv), Some(vpt)) if obv != vpt => None,
        (obv, vpt) => obv.or(vpt),
    };

    let calls = [
        (
            EvidenceSource::Rsi,
            above(set.value(IndicatorKind::Rsi), Some(50.0)),
        ),
        (
            EvidenceSource::Macd,
            above(set.value(IndicatorKind::MacdHistogram), Some(0.0)),
        ),
        (
            EvidenceSource::Bollinger,
            above(set.last_close, set.value(IndicatorKind::BollingerMiddle)),
        ),
        (
            EvidenceSource::Stochastic,
            above(set.value(IndicatorKind::StochasticK), Some(50.0)),
        ),
        (EvidenceSource::Volume, volume),
        (
            EvidenceSource::Trend,
            above(
                set.value(IndicatorKind::EmaFast),
                set.value(IndicatorKind::EmaSlow),
            ),
        ),
    ];

    calls
        .into_iter()
        .filter_map(|(source, direction)| {
            direction.map(|direction| Evidence {
                timeframe: Some(set.timeframe),
                source,
                direction,
                likelihood: priors.accuracy(source),
            })
        })
        .collect()
}

/// Logistic function that does not overflow for large |x|.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
