//! Position sizing for gate-approved recommendations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RiskConfig;
use crate::gate::ValidationReport;
use crate::metrics::kelly_fraction;
use crate::recommendation::{Action, Recommendation};
use crate::risk_profile::RiskProfile;

/// Fee rate floor applied whatever the configuration says.
pub const MIN_FEE_RATE: f64 = 0.002;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionSizing {
    Sized {
        /// Units such that a stop-out loses exactly `balance × risk_fraction`.
        standard_size: f64,
        /// Quote-currency notional from the capped Kelly fraction.
        kelly_size: Option<f64>,
        /// `standard_size` limited by the maximum position value.
        capped_size: f64,
        position_value: f64,
        estimated_fees: f64,
        /// Loss at the stop for `capped_size` units.
        risk_amount: f64,
    },
    NotSized {
        reason: String,
    },
}

impl PositionSizing {
    fn not_sized(reason: impl Into<String>) -> Self {
        PositionSizing::NotSized {
            reason: reason.into(),
        }
    }

    pub fn is_sized(&self) -> bool {
        matches!(self, PositionSizing::Sized { .. })
    }

    pub fn capped_size(&self) -> Option<f64> {
        match self {
            PositionSizing::Sized { capped_size, .. } => Some(*capped_size),
            PositionSizing::NotSized { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Size the recommendation, or explain why it cannot be sized.
    pub fn size(
        &self,
        recommendation: &Recommendation,
        report: &ValidationReport,
        risk: Option<&RiskProfile>,
        balance: f64,
    ) -> PositionSizing {
        if !report.execution_ready {
            return PositionSizing::not_sized("validation gate did not approve execution");
        }
        if !(balance.is_finite() && balance > 0.0) {
            return PositionSizing::not_sized(format!("invalid balance {balance}"));
        }
        let Some(levels) = recommendation.levels else {
            return PositionSizing::not_sized("no price levels");
        };
        let stop_distance = (levels.entry - levels.stop_loss).abs();
        if !(stop_distance > 0.0 && levels.entry > 0.0) {
            return PositionSizing::not_sized("zero stop distance");
        }

        let cfg = &self.config;
        let risk_budget = balance * cfg.risk_fraction;
        let standard_size = risk_budget / stop_distance;
        let max_size = cfg.max_position_fraction * balance / levels.entry;
        let capped_size = standard_size.min(max_size);
        let position_value = capped_size * levels.entry;
        let estimated_fees = position_value * cfg.fee_rate.max(MIN_FEE_RATE);
        let kelly_size = risk
            .and_then(|r| directional_kelly(r, recommendation.action, cfg.kelly_cap))
            .map(|f| balance * f.clamp(0.0, cfg.kelly_cap));

        debug!(
            standard_size,
            capped_size,
            position_value,
            kelly_size = ?kelly_size,
            "position sized"
        );
        PositionSizing::Sized {
            standard_size,
            kelly_size,
            capped_size,
            position_value,
            estimated_fees,
            risk_amount: capped_size * stop_distance,
        }
    }
}

/// Kelly fraction for the recommended side. A short wins when bars fall, so
/// its win probability is 1 − p and its payoff ratio is 1 / b.
fn directional_kelly(risk: &RiskProfile, action: Action, cap: f64) -> Option<f64> {
    let p = risk.win_rate?;
    let b = risk.avg_win_loss_ratio?;
    match action {
        Action::Long => kelly_fraction(p, b, cap),
        Action::Short => kelly_fraction(1.0 - p, 1.0 / b, cap),
        Action::Wait | Action::NoTrade => None,
    }
}
