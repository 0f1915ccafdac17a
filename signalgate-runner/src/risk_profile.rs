//! Risk profile of the primary series: tail risk, ratios, Kelly sizing input.
//!
//! `RiskAnalytics` ties together the pure functions in `metrics`,
//! `tail_metrics` and `monte_carlo` for one `OhlcvSeries`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use signalgate_core::domain::OhlcvSeries;
use signalgate_core::rng::RngHierarchy;
use signalgate_core::stats::std_dev;

use crate::config::{MonteCarloConfig, RiskConfig};
use crate::metrics;
use crate::monte_carlo::{self, MonteCarloResult};
use crate::tail_metrics::compute_tail_metrics;

/// Risk statistics of one bar-return series. Every `None` is an undefined
/// value (too little data or a zero denominator), never a stand-in zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Headline VaR: historical, falling back to parametric.
    pub var: Option<f64>,
    pub var_parametric: Option<f64>,
    pub var_historical: Option<f64>,
    pub var_modified: Option<f64>,
    pub cvar: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,
    pub max_drawdown: Option<f64>,
    /// Share of up bars among non-flat bars.
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    /// Per-bar standard deviation of returns.
    pub volatility: Option<f64>,
    pub skewness: Option<f64>,
    pub excess_kurtosis: Option<f64>,
    /// Long-side Kelly fraction from win rate and payoff ratio, capped.
    pub kelly_fraction: Option<f64>,
    pub avg_win_loss_ratio: Option<f64>,
    pub sample_size: usize,
    pub confidence_level: f64,
}

impl RiskProfile {
    /// Compute the profile for `returns` sampled `periods_per_year` times a year.
    pub fn from_returns(returns: &[f64], periods_per_year: f64, config: &RiskConfig) -> Self {
        let tail = compute_tail_metrics(returns, config.var_confidence);
        let win_rate = metrics::win_rate(returns);
        let payoff = metrics::avg_win_loss_ratio(returns);
        let kelly = match (win_rate, payoff) {
            (Some(p), Some(b)) => metrics::kelly_fraction(p, b, config.kelly_cap),
            _ => None,
        };
        let volatility = (returns.len() >= 2).then(|| std_dev(returns));

        Self {
            var: tail.var_historical.or(tail.var_parametric),
            var_parametric: tail.var_parametric,
            var_historical: tail.var_historical,
            var_modified: tail.var_modified,
            cvar: tail.cvar,
            sharpe: metrics::sharpe_ratio(returns, config.risk_free_rate, periods_per_year),
            sortino: metrics::sortino_ratio(returns, config.risk_free_rate, periods_per_year),
            calmar: metrics::calmar_ratio(returns, periods_per_year),
            max_drawdown: metrics::max_drawdown(returns),
            win_rate,
            profit_factor: metrics::profit_factor(returns),
            volatility,
            skewness: tail.skewness,
            excess_kurtosis: tail.excess_kurtosis,
            kelly_fraction: kelly,
            avg_win_loss_ratio: payoff,
            sample_size: returns.len(),
            confidence_level: config.var_confidence,
        }
    }

    /// Values that are present but not finite. Empty for a sane profile.
    pub fn non_finite_fields(&self) -> Vec<&'static str> {
        [
            ("var", self.var),
            ("var_parametric", self.var_parametric),
            ("var_historical", self.var_historical),
            ("var_modified", self.var_modified),
            ("cvar", self.cvar),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("volatility", self.volatility),
            ("skewness", self.skewness),
            ("excess_kurtosis", self.excess_kurtosis),
            ("kelly_fraction", self.kelly_fraction),
            ("avg_win_loss_ratio", self.avg_win_loss_ratio),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_some_and(|v| !v.is_finite()))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Risk analytics over one series.
#[derive(Debug, Clone, Default)]
pub struct RiskAnalytics {
    risk: RiskConfig,
    monte_carlo: MonteCarloConfig,
}

impl RiskAnalytics {
    pub fn new(risk: RiskConfig, monte_carlo: MonteCarloConfig) -> Self {
        Self { risk, monte_carlo }
    }

    /// Risk profile from the full close-to-close history, annualized by the
    /// series timeframe.
    pub fn assess(&self, series: &OhlcvSeries) -> RiskProfile {
        let returns = series.close_returns();
        let profile =
            RiskProfile::from_returns(&returns, series.timeframe.periods_per_year(), &self.risk);
        debug!(
            symbol = %series.symbol,
            timeframe = %series.timeframe,
            samples = profile.sample_size,
            sharpe = ?profile.sharpe,
            var = ?profile.var,
            "risk profile computed"
        );
        profile
    }

    pub fn simulate(
        &self,
        series: &OhlcvSeries,
        hierarchy: &RngHierarchy,
    ) -> Option<MonteCarloResult> {
        monte_carlo::simulate(&series.closes(), &self.monte_carlo, hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use signalgate_core::data::SyntheticSeries;
    use signalgate_core::domain::Timeframe;

    fn walk() -> OhlcvSeries {
        let as_of = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        SyntheticSeries::new("ETH/USDT", Timeframe::H1, as_of)
            .seed(3)
            .generate()
    }

    #[test]
    fn realistic_series_has_full_profile() {
        let series = walk();
        let profile = RiskAnalytics::default().assess(&series);
        assert_eq!(profile.sample_size, series.len() - 1);
        assert!(profile.var.is_some());
        assert!(profile.cvar.unwrap() <= profile.var.unwrap());
        assert!(profile.sharpe.is_some());
        assert!(profile.max_drawdown.unwrap() <= 0.0);
        assert!((0.0..=1.0).contains(&profile.win_rate.unwrap()));
        assert!(profile.kelly_fraction.unwrap() <= 0.20);
        assert!(profile.non_finite_fields().is_empty());
    }

    #[test]
    fn zero_variance_returns_are_undefined() {
        let returns = vec![0.0; 50];
        let profile = RiskProfile::from_returns(&returns, 8_760.0, &RiskConfig::default());
        assert!(profile.sharpe.is_none());
        assert!(profile.sortino.is_none());
        assert!(profile.var.is_none());
        assert!(profile.cvar.is_none());
        assert!(profile.win_rate.is_none());
        assert!(profile.kelly_fraction.is_none());
        assert_eq!(profile.max_drawdown, Some(0.0));
        assert_eq!(profile.volatility, Some(0.0));
    }

    #[test]
    fn kelly_uses_win_rate_and_payoff() {
        // 6 wins of +2%, 4 losses of -1%: p = 0.6, b = 2 -> f* = 0.4, capped 0.2
        let mut returns = vec![0.02; 6];
        returns.extend([-0.01; 4]);
        let profile = RiskProfile::from_returns(&returns, 252.0, &RiskConfig::default());
        assert_eq!(profile.kelly_fraction, Some(0.20));
        let loose = RiskConfig {
            kelly_cap: 1.0,
            ..RiskConfig::default()
        };
        let profile = RiskProfile::from_returns(&returns, 252.0, &loose);
        assert!((profile.kelly_fraction.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn simulate_uses_series_closes() {
        let series = walk();
        let analytics = RiskAnalytics::new(
            RiskConfig::default(),
            MonteCarloConfig {
                scenarios: 500,
                ..MonteCarloConfig::default()
            },
        );
        let result = analytics.simulate(&series, &RngHierarchy::new(8)).unwrap();
        assert_eq!(result.start_price, series.last_close().unwrap());
        assert_eq!(result.scenarios, 500);
    }
}
