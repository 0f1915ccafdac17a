//! Recommendation synthesis: fused probability plus risk context in, an
//! action with entry/stop/target out.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use signalgate_core::domain::{Direction, PatternBias};

use crate::config::SignalConfig;
use crate::fusion::FusionResult;
use crate::monte_carlo::MonteCarloResult;
use crate::risk_profile::RiskProfile;

/// Monte Carlo deviations from 50% below this many points are ignored.
const MC_MIN_DEVIATION: f64 = 2.0;
/// |Sharpe| below this is ignored.
const SHARPE_MIN_MAGNITUDE: f64 = 0.1;
const WIN_RATE_HIGH: f64 = 0.55;
const WIN_RATE_LOW: f64 = 0.45;
const WIN_RATE_ADJUSTMENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Long,
    Short,
    Wait,
    NoTrade,
}

impl Action {
    pub fn is_directional(self) -> bool {
        matches!(self, Action::Long | Action::Short)
    }

    fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Bullish => Action::Long,
            Direction::Bearish => Action::Short,
            Direction::Neutral => Action::Wait,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Long => "LONG",
            Action::Short => "SHORT",
            Action::Wait => "WAIT",
            Action::NoTrade => "NO_TRADE",
        };
        f.write_str(label)
    }
}

/// Entry, protective stop and profit target for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// |take_profit − entry| / |entry − stop_loss|
    pub risk_reward: f64,
}

impl PriceLevels {
    /// LONG: stop < entry < target. SHORT: target < entry < stop.
    pub fn is_ordered_for(&self, action: Action) -> bool {
        match action {
            Action::Long => self.stop_loss < self.entry && self.entry < self.take_profit,
            Action::Short => self.take_profit < self.entry && self.entry < self.stop_loss,
            Action::Wait | Action::NoTrade => false,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.entry.is_finite()
            && self.stop_loss.is_finite()
            && self.take_profit.is_finite()
            && self.risk_reward.is_finite()
    }
}

/// ATR-based levels around `entry`. `None` for a neutral direction, a
/// non-positive ATR, or a level that would land at or below zero.
pub fn price_levels(
    direction: Direction,
    entry: f64,
    atr: f64,
    stop_multiple: f64,
    target_multiple: f64,
) -> Option<PriceLevels> {
    if !(entry.is_finite() && entry > 0.0 && atr.is_finite() && atr > 0.0) {
        return None;
    }
    let sign = direction.sign();
    if sign == 0.0 {
        return None;
    }
    let stop_loss = entry - sign * stop_multiple * atr;
    let take_profit = entry + sign * target_multiple * atr;
    if stop_loss <= 0.0 || take_profit <= 0.0 {
        return None;
    }
    let risk = (entry - stop_loss).abs();
    if risk <= 0.0 {
        return None;
    }
    Some(PriceLevels {
        entry,
        stop_loss,
        take_profit,
        risk_reward: (take_profit - entry).abs() / risk,
    })
}

/// Synthesized recommendation.
///
/// `levels` is present exactly when the action is LONG or SHORT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub direction: Direction,
    /// 0..=cap; never above 95.
    pub confidence: f64,
    pub levels: Option<PriceLevels>,
    pub reasons: Vec<String>,
}

impl Recommendation {
    pub fn wait(direction: Direction, confidence: f64, reasons: Vec<String>) -> Self {
        Self {
            action: Action::Wait,
            direction,
            confidence,
            levels: None,
            reasons,
        }
    }

    /// Replace the action with NO_TRADE, keeping the analysis that led here.
    pub fn vetoed(mut self, reason: impl Into<String>) -> Self {
        self.action = Action::NoTrade;
        self.levels = None;
        self.reasons.push(reason.into());
        self
    }

    pub fn risk_reward(&self) -> Option<f64> {
        self.levels.map(|l| l.risk_reward)
    }
}

/// Everything the synthesizer looks at.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub fusion: &'a FusionResult,
    pub pattern: &'a PatternBias,
    pub risk: Option<&'a RiskProfile>,
    pub monte_carlo: Option<&'a MonteCarloResult>,
    /// Latest ATR of the primary timeframe.
    pub atr: Option<f64>,
    /// Latest close of the primary timeframe.
    pub last_close: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationSynthesizer {
    config: SignalConfig,
}

impl RecommendationSynthesizer {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(&self, input: SynthesisInput<'_>) -> Recommendation {
        let cfg = &self.config;
        let fusion = input.fusion;
        let direction = fusion.direction;
        let dominant = fusion.dominant_probability();
        let base = (dominant * 100.0).min(cfg.confidence_cap);

        if !fusion.sufficient_evidence {
            return Recommendation::wait(
                direction,
                base.clamp(0.0, cfg.confidence_cap),
                vec![format!(
                    "insufficient evidence: {} of {} required timeframes valid",
                    fusion.timeframes_used, cfg.min_timeframes
                )],
            );
        }
        if !direction.is_directional() {
            return Recommendation::wait(
                direction,
                base.clamp(0.0, cfg.confidence_cap),
                vec!["evidence is balanced; no direction".to_string()],
            );
        }

        let mut reasons = vec![format!(
            "fused {:?} probability {:.1}% ({:?})",
            direction,
            dominant * 100.0,
            fusion.strength
        )];
        let mut confidence = base;
        let sign = direction.sign();

        if input.pattern.is_informative() {
            let magnitude = 10.0 + 5.0 * input.pattern.confidence;
            if input.pattern.direction == direction {
                confidence += magnitude;
                reasons.push(format!("pattern agrees (+{magnitude:.1})"));
            } else {
                confidence -= magnitude;
                reasons.push(format!("pattern conflicts (-{magnitude:.1})"));
            }
        }

        if let Some(mc) = input.monte_carlo {
            let deviation = mc.directional_profit_probability(sign) - 50.0;
            if deviation.abs() >= MC_MIN_DEVIATION {
                let adjustment = deviation.signum() * (5.0 + 5.0 * deviation.abs() / 50.0);
                confidence += adjustment;
                reasons.push(format!(
                    "monte carlo profit probability {:.1}% ({adjustment:+.1})",
                    mc.directional_profit_probability(sign)
                ));
            }
        }

        if let Some(risk) = input.risk {
            if let Some(sharpe) = risk.sharpe {
                let aligned = sharpe * sign;
                if aligned.abs() >= SHARPE_MIN_MAGNITUDE {
                    let adjustment =
                        aligned.signum() * (5.0 + 5.0 * (aligned.abs() / 2.0).min(1.0));
                    confidence += adjustment;
                    reasons.push(format!("sharpe {sharpe:.2} ({adjustment:+.1})"));
                }
            }
            if let Some(win_rate) = risk.win_rate {
                let directional = if sign < 0.0 { 1.0 - win_rate } else { win_rate };
                let adjustment = if directional > WIN_RATE_HIGH {
                    WIN_RATE_ADJUSTMENT
                } else if directional < WIN_RATE_LOW {
                    -WIN_RATE_ADJUSTMENT
                } else {
                    0.0
                };
                if adjustment != 0.0 {
                    confidence += adjustment;
                    reasons.push(format!(
                        "win rate {:.1}% ({adjustment:+.1})",
                        directional * 100.0
                    ));
                }
            }
        }

        let confidence = confidence.clamp(0.0, cfg.confidence_cap);

        let levels = match (input.last_close, input.atr) {
            (Some(entry), Some(atr)) => price_levels(
                direction,
                entry,
                atr,
                cfg.stop_atr_multiple,
                cfg.target_atr_multiple,
            ),
            _ => None,
        };
        let Some(levels) = levels else {
            reasons.push("ATR or latest close unavailable; no price levels".to_string());
            return Recommendation::wait(direction, confidence, reasons);
        };

        if dominant < cfg.min_probability {
            reasons.push(format!(
                "probability {:.1}% below {:.1}%",
                dominant * 100.0,
                cfg.min_probability * 100.0
            ));
            return Recommendation::wait(direction, confidence, reasons);
        }
        if confidence < cfg.min_confidence {
            reasons.push(format!(
                "confidence {confidence:.1} below {:.1}",
                cfg.min_confidence
            ));
            return Recommendation::wait(direction, confidence, reasons);
        }

        let recommendation = Recommendation {
            action: Action::from_direction(direction),
            direction,
            confidence,
            levels: Some(levels),
            reasons,
        };
        debug!(
            action = %recommendation.action,
            confidence = recommendation.confidence,
            entry = levels.entry,
            stop_loss = levels.stop_loss,
            take_profit = levels.take_profit,
            "recommendation synthesized"
        );
        recommendation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::SignalStrength;

    fn fusion(bullish: f64, sufficient: bool) -> FusionResult {
        let direction = if bullish > 0.5 {
            Direction::Bullish
        } else if bullish < 0.5 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };
        FusionResult {
            bullish_probability: bullish,
            bearish_probability: 1.0 - bullish,
            strength: SignalStrength::from_probability(bullish.max(1.0 - bullish)),
            direction,
            timeframes_used: if sufficient { 2 } else { 1 },
            per_timeframe: Vec::new(),
            evidence: Vec::new(),
            evidence_count: 4,
            prior_version: 1,
            sufficient_evidence: sufficient,
        }
    }

    fn input<'a>(fusion: &'a FusionResult, pattern: &'a PatternBias) -> SynthesisInput<'a> {
        SynthesisInput {
            fusion,
            pattern,
            risk: None,
            monte_carlo: None,
            atr: Some(2.0),
            last_close: Some(100.0),
        }
    }

    #[test]
    fn long_levels_from_atr() {
        let levels = price_levels(Direction::Bullish, 100.0, 2.0, 2.0, 3.0).unwrap();
        assert_eq!(levels.stop_loss, 96.0);
        assert_eq!(levels.take_profit, 106.0);
        assert_eq!(levels.risk_reward, 1.5);
        assert!(levels.is_ordered_for(Action::Long));
        assert!(!levels.is_ordered_for(Action::Short));
    }

    #[test]
    fn short_levels_are_mirrored() {
        let levels = price_levels(Direction::Bearish, 100.0, 2.0, 2.0, 3.0).unwrap();
        assert_eq!(levels.stop_loss, 104.0);
        assert_eq!(levels.take_profit, 94.0);
        assert_eq!(levels.risk_reward, 1.5);
        assert!(levels.is_ordered_for(Action::Short));
    }

    #[test]
    fn degenerate_levels_are_undefined() {
        assert!(price_levels(Direction::Neutral, 100.0, 2.0, 2.0, 3.0).is_none());
        assert!(price_levels(Direction::Bullish, 100.0, 0.0, 2.0, 3.0).is_none());
        assert!(price_levels(Direction::Bullish, 100.0, f64::NAN, 2.0, 3.0).is_none());
        // stop would be negative
        assert!(price_levels(Direction::Bullish, 10.0, 6.0, 2.0, 3.0).is_none());
    }

    #[test]
    fn base_confidence_is_dominant_probability() {
        let f = fusion(0.72, true);
        let p = PatternBias::neutral();
        let rec = RecommendationSynthesizer::default().synthesize(input(&f, &p));
        assert_eq!(rec.action, Action::Long);
        assert!((rec.confidence - 72.0).abs() < 1e-9);
        assert_eq!(rec.levels.unwrap().stop_loss, 96.0);
    }

    #[test]
    fn confidence_is_capped_at_95() {
        let f = fusion(0.99, true);
        let p = PatternBias::new(Direction::Bullish, 1.0);
        let rec = RecommendationSynthesizer::default().synthesize(input(&f, &p));
        assert_eq!(rec.confidence, 95.0);
    }

    #[test]
    fn conflicting_pattern_lowers_confidence() {
        let f = fusion(0.25, true);
        let agree = PatternBias::new(Direction::Bearish, 0.6);
        let conflict = PatternBias::new(Direction::Bullish, 0.6);
        let synth = RecommendationSynthesizer::default();
        let a = synth.synthesize(input(&f, &agree));
        let c = synth.synthesize(input(&f, &conflict));
        assert_eq!(a.action, Action::Short);
        assert!((a.confidence - 88.0).abs() < 1e-9);
        assert!((c.confidence - 62.0).abs() < 1e-9);
    }

    #[test]
    fn risk_adjustments_follow_direction() {
        let f = fusion(0.30, true);
        let p = PatternBias::neutral();
        let mc = MonteCarloResult {
            scenarios: 1000,
            horizon: 5,
            drift_model: crate::monte_carlo::DriftModel::Historical,
            seed: 1,
            start_price: 100.0,
            mu: -0.001,
            sigma: 0.01,
            expected_return_pct: -0.5,
            // 40% long profit -> 60% short profit, deviation +10
            profit_probability_pct: 40.0,
            p5_return_pct: -3.0,
            p95_return_pct: 2.0,
            median_return_pct: -0.4,
            expected_price: 99.5,
            median_price: 99.6,
            std_error_pct: 0.05,
        };
        let mut risk = crate::risk_profile::RiskProfile::from_returns(
            &[0.01, -0.02, 0.005, -0.01, -0.003, 0.002, -0.015, 0.001, -0.004, -0.002],
            8_760.0,
            &crate::config::RiskConfig::default(),
        );
        risk.sharpe = Some(-1.0);
        risk.win_rate = Some(0.40);

        let rec = RecommendationSynthesizer::default().synthesize(SynthesisInput {
            risk: Some(&risk),
            monte_carlo: Some(&mc),
            ..input(&f, &p)
        });
        // 70 + (5 + 1) + (5 + 2.5) + 5
        assert_eq!(rec.action, Action::Short);
        assert!((rec.confidence - 88.5).abs() < 1e-9, "{}", rec.confidence);
    }

    #[test]
    fn insufficient_evidence_waits() {
        let f = fusion(0.9, false);
        let p = PatternBias::neutral();
        let rec = RecommendationSynthesizer::default().synthesize(input(&f, &p));
        assert_eq!(rec.action, Action::Wait);
        assert!(rec.levels.is_none());
        assert!(rec.reasons[0].contains("insufficient evidence"));
    }

    #[test]
    fn weak_probability_waits() {
        let f = fusion(0.56, true);
        let p = PatternBias::new(Direction::Bullish, 1.0);
        let rec = RecommendationSynthesizer::default().synthesize(input(&f, &p));
        assert_eq!(rec.action, Action::Wait);
        assert!(rec.confidence > 60.0);
    }

    #[test]
    fn missing_atr_waits() {
        let f = fusion(0.8, true);
        let p = PatternBias::neutral();
        let rec = RecommendationSynthesizer::default().synthesize(SynthesisInput {
            atr: None,
            ..input(&f, &p)
        });
        assert_eq!(rec.action, Action::Wait);
    }

    #[test]
    fn veto_turns_into_no_trade() {
        let f = fusion(0.8, true);
        let p = PatternBias::neutral();
        let rec = RecommendationSynthesizer::default()
            .synthesize(input(&f, &p))
            .vetoed("gate blocked");
        assert_eq!(rec.action, Action::NoTrade);
        assert!(rec.levels.is_none());
        assert_eq!(rec.reasons.last().unwrap(), "gate blocked");
    }
}
