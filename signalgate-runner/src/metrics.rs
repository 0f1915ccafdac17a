//! Performance ratios over a bar-return series.
//!
//! Every metric is a pure function: returns in, `Option<f64>` out. `None`
//! means the ratio is undefined (zero denominator, too little data, non-finite
//! intermediate); no metric substitutes 0 or infinity for "unknown".

use signalgate_core::stats::{mean_f64, std_dev};
use tracing::warn;

/// Standard deviations below this are treated as zero.
const MIN_STD: f64 = 1e-15;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Guard recovery: the ratio has a zero denominator.
fn undefined(metric: &'static str, reason: &'static str) -> Option<f64> {
    warn!(metric, reason, "ratio undefined, reported as unknown");
    None
}

// ─── Risk-adjusted return ───────────────────────────────────────────

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r − rf/ppy) / std(r − rf/ppy) × √ppy.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();
    let std = std_dev(&excess);
    if std < MIN_STD {
        return undefined("sharpe", "zero return dispersion");
    }
    finite(mean_f64(&excess) / std * periods_per_year.sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Downside deviation uses the full observation count in the denominator.
/// Undefined when no period fell below the risk-free rate.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / excess.len() as f64).sqrt();
    if downside_std < MIN_STD {
        return undefined("sortino", "no downside deviation");
    }
    finite(mean_f64(&excess) / downside_std * periods_per_year.sqrt())
}

/// Calmar ratio: annualized return / |max drawdown|.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    let annual = annualized_return(returns, periods_per_year)?;
    let dd = max_drawdown(returns)?;
    if dd.abs() < MIN_STD {
        return undefined("calmar", "no drawdown");
    }
    finite(annual / dd.abs())
}

/// Compound annual growth implied by the return series.
///
/// Computed in log space so long high-frequency histories do not overflow.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.is_empty() || returns.iter().any(|&r| r <= -1.0) {
        return None;
    }
    let log_growth: f64 = returns.iter().map(|r| r.ln_1p()).sum();
    let years = returns.len() as f64 / periods_per_year;
    finite((log_growth / years).exp_m1())
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Compounded equity curve starting at 1.0.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut equity = 1.0;
    curve.push(equity);
    for r in returns {
        equity *= 1.0 + r;
        curve.push(equity);
    }
    curve
}

/// Maximum peak-to-trough drawdown as a negative fraction (−0.15 = 15%).
///
/// `Some(0.0)` when equity never falls below a previous peak.
pub fn max_drawdown(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for eq in equity_curve(returns) {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    finite(max_dd)
}

// ─── Win/loss distribution ──────────────────────────────────────────

/// Share of non-zero returns that were positive.
pub fn win_rate(returns: &[f64]) -> Option<f64> {
    let wins = returns.iter().filter(|&&r| r > 0.0).count();
    let losses = returns.iter().filter(|&&r| r < 0.0).count();
    if wins + losses == 0 {
        return None;
    }
    Some(wins as f64 / (wins + losses) as f64)
}

/// Gross gains / gross losses. Undefined when nothing was lost.
pub fn profit_factor(returns: &[f64]) -> Option<f64> {
    let gains: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();
    if losses < MIN_STD {
        return undefined("profit_factor", "no losing returns");
    }
    finite(gains / losses)
}

/// Mean winning return / mean losing magnitude.
pub fn avg_win_loss_ratio(returns: &[f64]) -> Option<f64> {
    let wins: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
    let losses: Vec<f64> = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.abs())
        .collect();
    if wins.is_empty() || losses.is_empty() {
        return None;
    }
    let avg_loss = mean_f64(&losses);
    if avg_loss < MIN_STD {
        return undefined("avg_win_loss", "zero average loss");
    }
    finite(mean_f64(&wins) / avg_loss)
}

/// Kelly fraction f* = (p·b − q) / b, capped at `cap`.
///
/// May be negative (no edge). Undefined for a non-positive payoff ratio or
/// a probability outside [0, 1].
pub fn kelly_fraction(win_probability: f64, payoff_ratio: f64, cap: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&win_probability) || !(payoff_ratio.is_finite() && payoff_ratio > 0.0)
    {
        return None;
    }
    let q = 1.0 - win_probability;
    finite(((win_probability * payoff_ratio - q) / payoff_ratio).min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: f64 = 252.0;

    fn alternating(up: f64, down: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { up } else { down }).collect()
    }

    #[test]
    fn sharpe_positive_for_positive_drift() {
        let r = alternating(0.02, -0.01, 100);
        let s = sharpe_ratio(&r, 0.0, DAILY).unwrap();
        assert!(s > 0.0);
        let expected = mean_f64(&r) / std_dev(&r) * DAILY.sqrt();
        assert!((s - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_is_undefined() {
        let flat = vec![0.001; 50];
        assert!(sharpe_ratio(&flat, 0.0, DAILY).is_none());
        assert!(sortino_ratio(&flat, 0.0, DAILY).is_none());
        assert!(sharpe_ratio(&[0.01], 0.0, DAILY).is_none());
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let r = alternating(0.02, -0.01, 100);
        let base = sharpe_ratio(&r, 0.0, DAILY).unwrap();
        let with_rf = sharpe_ratio(&r, 0.5, DAILY).unwrap();
        assert!(with_rf < base);
    }

    #[test]
    fn sortino_ignores_upside() {
        let r = alternating(0.05, -0.01, 60);
        let sortino = sortino_ratio(&r, 0.0, DAILY).unwrap();
        let sharpe = sharpe_ratio(&r, 0.0, DAILY).unwrap();
        assert!(sortino > sharpe);
        assert!(sortino_ratio(&[0.01, 0.02, 0.03], 0.0, DAILY).is_none());
    }

    #[test]
    fn drawdown_from_peak() {
        // 1.0 -> 1.1 -> 0.88 -> 0.968
        let r = [0.10, -0.20, 0.10];
        let dd = max_drawdown(&r).unwrap();
        assert!((dd + 0.20).abs() < 1e-12);
        assert_eq!(max_drawdown(&[0.01, 0.02]), Some(0.0));
        assert!(max_drawdown(&[]).is_none());
    }

    #[test]
    fn equity_curve_compounds() {
        let curve = equity_curve(&[0.10, -0.10]);
        assert_eq!(curve.len(), 3);
        assert!((curve[2] - 0.99).abs() < 1e-12);
    }

    #[test]
    fn annualized_return_of_steady_growth() {
        let r = vec![0.001; 252];
        let annual = annualized_return(&r, DAILY).unwrap();
        assert!((annual - (1.001_f64.powi(252) - 1.0)).abs() < 1e-9);
        assert!(annualized_return(&[-1.0, 0.5], DAILY).is_none());
    }

    #[test]
    fn calmar_undefined_without_drawdown() {
        assert!(calmar_ratio(&[0.01, 0.01, 0.02], DAILY).is_none());
        let r = alternating(0.02, -0.01, 100);
        assert!(calmar_ratio(&r, DAILY).unwrap() > 0.0);
    }

    #[test]
    fn win_rate_excludes_flat_periods() {
        assert_eq!(win_rate(&[0.01, -0.01, 0.0, 0.02]), Some(2.0 / 3.0));
        assert!(win_rate(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn profit_factor_and_payoff() {
        let r = [0.03, -0.01, 0.01, -0.01];
        assert!((profit_factor(&r).unwrap() - 2.0).abs() < 1e-12);
        assert!((avg_win_loss_ratio(&r).unwrap() - 2.0).abs() < 1e-12);
        assert!(profit_factor(&[0.01, 0.02]).is_none());
        assert!(avg_win_loss_ratio(&[0.01, 0.02]).is_none());
    }

    #[test]
    fn kelly_matches_formula_and_cap() {
        // p = 0.6, b = 1 -> f* = 0.2
        assert!((kelly_fraction(0.6, 1.0, 1.0).unwrap() - 0.2).abs() < 1e-12);
        // capped
        assert_eq!(kelly_fraction(0.9, 2.0, 0.2), Some(0.2));
        // no edge -> negative
        assert!(kelly_fraction(0.4, 1.0, 0.2).unwrap() < 0.0);
        assert!(kelly_fraction(0.6, 0.0, 0.2).is_none());
        assert!(kelly_fraction(1.2, 1.0, 0.2).is_none());
    }
}
