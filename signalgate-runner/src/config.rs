//! Serializable analysis configuration.
//!
//! Every section derives `Default` and is `#[serde(default)]`, so a partial
//! TOML document fills in the rest. `validate` rejects out-of-range values
//! before any analysis runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signalgate_core::domain::Timeframe;
use signalgate_core::indicators::{IndicatorParams, InvalidIndicatorParams};
use signalgate_core::validation::DataValidationConfig;

use crate::monte_carlo::DriftModel;

/// Hard ceiling on recommendation confidence.
pub const MAX_CONFIDENCE: f64 = 95.0;

/// Configuration and prior-table errors. These indicate caller misuse, not
/// market conditions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown evidence source '{0}'")]
    UnknownSource(String),

    #[error("prior accuracy for {name} must lie strictly between 0 and 1, got {value}")]
    InvalidAccuracy { name: String, value: f64 },

    #[error(transparent)]
    Indicators(#[from] InvalidIndicatorParams),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn check_unit_open(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be in (0, 1], got {value}")))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

/// Full configuration for one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Strict freshness (5 minutes) instead of normal (15 minutes).
    pub strict_freshness: bool,
    pub data: DataValidationConfig,
    pub indicators: IndicatorParams,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub monte_carlo: MonteCarloConfig,
    pub gate: GateConfig,
    pub backtest: BacktestConfig,
}

impl AnalysisConfig {
    /// Parse a (possibly partial) TOML document and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.check()?;
        self.validate_data()?;
        self.signal.validate()?;
        self.risk.validate()?;
        self.monte_carlo.validate()?;
        self.gate.validate()?;
        self.backtest.validate(self.data.min_bars)
    }

    fn validate_data(&self) -> Result<(), ConfigError> {
        let d = &self.data;
        check_positive("data.max_bar_jump", d.max_bar_jump)?;
        check_positive("data.z_score_threshold", d.z_score_threshold)?;
        check_positive("data.volume_iqr_multiplier", d.volume_iqr_multiplier)?;
        if !(d.benford_alpha > 0.0 && d.benford_alpha < 1.0) {
            return Err(invalid("data.benford_alpha", "must be in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&d.max_missing_ratio) {
            return Err(invalid("data.max_missing_ratio", "must be in [0, 1]"));
        }
        if d.max_frozen_run < 2 {
            return Err(invalid("data.max_frozen_run", "must be at least 2"));
        }
        if d.benford_corroborating_run < 2 {
            return Err(invalid("data.benford_corroborating_run", "must be at least 2"));
        }
        Ok(())
    }

    /// BLAKE3 hash of the canonical JSON form, for reproducibility records.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

/// Recommendation thresholds shared by the synthesizer and the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Upper bound on confidence (never above 95).
    pub confidence_cap: f64,
    /// Minimum confidence for a directional action.
    pub min_confidence: f64,
    /// Minimum dominant-side probability for a directional action.
    pub min_probability: f64,
    pub min_risk_reward: f64,
    /// Minimum number of timeframes with valid indicator sets.
    pub min_timeframes: usize,
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            confidence_cap: MAX_CONFIDENCE,
            min_confidence: 40.0,
            min_probability: 0.60,
            min_risk_reward: 1.5,
            min_timeframes: 2,
            stop_atr_multiple: 2.0,
            target_atr_multiple: 3.0,
        }
    }
}

impl SignalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_cap > 0.0 && self.confidence_cap <= MAX_CONFIDENCE) {
            return Err(invalid(
                "signal.confidence_cap",
                format!("must be in (0, {MAX_CONFIDENCE}], got {}", self.confidence_cap),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(invalid("signal.min_confidence", "must be in [0, 100]"));
        }
        if !(self.min_probability >= 0.5 && self.min_probability < 1.0) {
            return Err(invalid("signal.min_probability", "must be in [0.5, 1)"));
        }
        check_positive("signal.min_risk_reward", self.min_risk_reward)?;
        if self.min_timeframes == 0 {
            return Err(invalid("signal.min_timeframes", "must be at least 1"));
        }
        check_positive("signal.stop_atr_multiple", self.stop_atr_multiple)?;
        check_positive("signal.target_atr_multiple", self.target_atr_multiple)
    }
}

/// Risk analytics and position sizing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Share of balance put at risk per trade.
    pub risk_fraction: f64,
    /// Largest position value as a share of balance.
    pub max_position_fraction: f64,
    pub kelly_cap: f64,
    /// Fee rate; never below `sizing::MIN_FEE_RATE`.
    pub fee_rate: f64,
    /// Annual risk-free rate for Sharpe/Sortino.
    pub risk_free_rate: f64,
    /// VaR/CVaR confidence level.
    pub var_confidence: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: 0.02,
            max_position_fraction: 0.10,
            kelly_cap: 0.20,
            fee_rate: 0.002,
            risk_free_rate: 0.0,
            var_confidence: 0.95,
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_unit_open("risk.risk_fraction", self.risk_fraction)?;
        check_unit_open("risk.max_position_fraction", self.max_position_fraction)?;
        check_unit_open("risk.kelly_cap", self.kelly_cap)?;
        if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0 && self.fee_rate < 1.0) {
            return Err(invalid("risk.fee_rate", "must be in [0, 1)"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk.risk_free_rate", "must be finite"));
        }
        if !(self.var_confidence > 0.5 && self.var_confidence < 1.0) {
            return Err(invalid("risk.var_confidence", "must be in (0.5, 1)"));
        }
        Ok(())
    }
}

/// Monte Carlo simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub scenarios: usize,
    /// Forward horizon in bars.
    pub horizon: usize,
    /// Number of recent log returns used to estimate drift and volatility.
    pub lookback: usize,
    /// Minimum usable returns; fewer leaves the result undefined.
    pub min_returns: usize,
    /// Per-step log-increment clamp.
    pub exponent_clamp: f64,
    /// Paths per parallel chunk; each chunk has its own derived RNG.
    pub chunk_size: usize,
    pub drift_model: DriftModel,
    /// Fixed master seed. `None` draws a fresh seed per analysis.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            scenarios: 10_000,
            horizon: 5,
            lookback: 100,
            min_returns: 10,
            exponent_clamp: 5.0,
            chunk_size: 1_000,
            drift_model: DriftModel::Historical,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios == 0 {
            return Err(invalid("monte_carlo.scenarios", "must be at least 1"));
        }
        if self.horizon == 0 {
            return Err(invalid("monte_carlo.horizon", "must be at least 1"));
        }
        if self.min_returns < 2 {
            return Err(invalid("monte_carlo.min_returns", "must be at least 2"));
        }
        if self.lookback < self.min_returns {
            return Err(invalid(
                "monte_carlo.lookback",
                "must be at least monte_carlo.min_returns",
            ));
        }
        check_positive("monte_carlo.exponent_clamp", self.exponent_clamp)?;
        if self.chunk_size == 0 {
            return Err(invalid("monte_carlo.chunk_size", "must be at least 1"));
        }
        Ok(())
    }
}

/// Validation gate thresholds beyond the shared signal thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Largest allowed spread of per-timeframe dominant probabilities, in points.
    pub max_confidence_spread: f64,
    /// Largest allowed (max - min) / mean of latest closes across timeframes.
    pub max_price_spread: f64,
    pub cross_check_tolerance: f64,
    pub warn_confidence_above: f64,
    pub warn_risk_reward_above: f64,
    /// ATR / close above this is reported as a high-volatility regime.
    pub high_volatility_ratio: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_confidence_spread: 20.0,
            max_price_spread: 0.02,
            cross_check_tolerance: 1e-6,
            warn_confidence_above: 90.0,
            warn_risk_reward_above: 8.0,
            high_volatility_ratio: 0.05,
        }
    }
}

impl GateConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("gate.max_confidence_spread", self.max_confidence_spread)?;
        check_positive("gate.max_price_spread", self.max_price_spread)?;
        check_positive("gate.cross_check_tolerance", self.cross_check_tolerance)?;
        check_positive("gate.warn_confidence_above", self.warn_confidence_above)?;
        check_positive("gate.warn_risk_reward_above", self.warn_risk_reward_above)?;
        check_positive("gate.high_volatility_ratio", self.high_volatility_ratio)
    }
}

/// Historical replay parameters and the go/no-go criteria applied to its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fee rate charged on notional at entry and again at exit.
    pub trading_fee: f64,
    /// Fills move this fraction against the trade on both sides.
    pub slippage: f64,
    /// Higher timeframes built from the replayed series; each must be a whole
    /// multiple of it.
    pub confirmation_timeframes: Vec<Timeframe>,
    /// Bars of each timeframe handed to one analysis.
    pub lookback_bars: usize,
    /// Open positions are closed at the close of this many bars after entry.
    pub max_holding_bars: usize,
    pub min_sharpe: f64,
    pub min_win_rate_pct: f64,
    pub min_profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub min_trades: usize,
    /// A scenario returning less than this fails the robustness check.
    pub robust_loss_floor_pct: f64,
    pub robust_min_sharpe: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            trading_fee: 0.001,
            slippage: 0.0005,
            confirmation_timeframes: vec![Timeframe::H4],
            lookback_bars: 120,
            max_holding_bars: 48,
            min_sharpe: 1.0,
            min_win_rate_pct: 45.0,
            min_profit_factor: 1.2,
            max_drawdown_pct: 30.0,
            min_trades: 10,
            robust_loss_floor_pct: -10.0,
            robust_min_sharpe: 0.8,
        }
    }
}

impl BacktestConfig {
    fn validate(&self, min_bars: usize) -> Result<(), ConfigError> {
        check_positive("backtest.initial_capital", self.initial_capital)?;
        for (field, rate) in [
            ("backtest.trading_fee", self.trading_fee),
            ("backtest.slippage", self.slippage),
        ] {
            if !(rate.is_finite() && (0.0..0.1).contains(&rate)) {
                return Err(invalid(field, format!("must be in [0, 0.1), got {rate}")));
            }
        }
        if self.lookback_bars < min_bars.max(2) {
            return Err(invalid(
                "backtest.lookback_bars",
                format!("must be at least data.min_bars ({min_bars})"),
            ));
        }
        if self.max_holding_bars == 0 {
            return Err(invalid("backtest.max_holding_bars", "must be at least 1"));
        }
        if !self.min_sharpe.is_finite() {
            return Err(invalid("backtest.min_sharpe", "must be finite"));
        }
        if !(0.0..=100.0).contains(&self.min_win_rate_pct) {
            return Err(invalid("backtest.min_win_rate_pct", "must be in [0, 100]"));
        }
        check_positive("backtest.min_profit_factor", self.min_profit_factor)?;
        if !(self.max_drawdown_pct > 0.0 && self.max_drawdown_pct <= 100.0) {
            return Err(invalid("backtest.max_drawdown_pct", "must be in (0, 100]"));
        }
        if self.min_trades == 0 {
            return Err(invalid("backtest.min_trades", "must be at least 1"));
        }
        if !(self.robust_loss_floor_pct.is_finite() && self.robust_loss_floor_pct <= 0.0) {
            return Err(invalid("backtest.robust_loss_floor_pct", "must be finite and <= 0"));
        }
        if !self.robust_min_sharpe.is_finite() {
            return Err(invalid("backtest.robust_min_sharpe", "must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            strict_freshness = true

            [risk]
            risk_fraction = 0.01

            [monte_carlo]
            scenarios = 2000
            seed = 7
            drift_model = "risk_neutral"
            "#,
        )
        .unwrap();
        assert!(config.strict_freshness);
        assert_eq!(config.risk.risk_fraction, 0.01);
        assert_eq!(config.risk.max_position_fraction, 0.10);
        assert_eq!(config.monte_carlo.scenarios, 2000);
        assert_eq!(config.monte_carlo.seed, Some(7));
        assert_eq!(config.monte_carlo.drift_model, DriftModel::RiskNeutral);
        assert_eq!(config.signal.min_confidence, 40.0);
        assert_eq!(config.indicators.rsi_period, 14);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            AnalysisConfig::from_toml_str("").unwrap(),
            AnalysisConfig::default()
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = AnalysisConfig::from_toml_str("[risk]\nrisk_fraction = 1.5").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "risk.risk_fraction",
                ..
            }
        ));

        let err = AnalysisConfig::from_toml_str("[signal]\nconfidence_cap = 99.0").unwrap_err();
        assert!(err.to_string().contains("confidence_cap"));

        let err = AnalysisConfig::from_toml_str("[monte_carlo]\nscenarios = 0").unwrap_err();
        assert!(err.to_string().contains("scenarios"));

        let err =
            AnalysisConfig::from_toml_str("[data]\nbenford_corroborating_run = 1").unwrap_err();
        assert!(err.to_string().contains("benford_corroborating_run"));

        let err = AnalysisConfig::from_toml_str("[backtest]\nslippage = 0.5").unwrap_err();
        assert!(err.to_string().contains("backtest.slippage"));

        let err = AnalysisConfig::from_toml_str("[backtest]\nlookback_bars = 5").unwrap_err();
        assert!(err.to_string().contains("backtest.lookback_bars"));
    }

    #[test]
    fn backtest_section_parses_timeframes() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [backtest]
            initial_capital = 50000.0
            confirmation_timeframes = ["4h", "1d"]
            min_trades = 20
            "#,
        )
        .unwrap();
        assert_eq!(
            config.backtest.confirmation_timeframes,
            vec![Timeframe::H4, Timeframe::D1]
        );
        assert_eq!(config.backtest.initial_capital, 50_000.0);
        assert_eq!(config.backtest.min_trades, 20);
        assert_eq!(config.backtest.trading_fee, 0.001);
        assert_eq!(config.backtest.min_win_rate_pct, 45.0);
    }

    #[test]
    fn bad_indicator_params_surface() {
        let err = AnalysisConfig::from_toml_str("[indicators]\nmacd_fast = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Indicators(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AnalysisConfig::from_toml_str("[risk\nrisk_fraction = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = AnalysisConfig::default();
        let mut b = AnalysisConfig::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.monte_carlo.scenarios = 5_000;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }
}
