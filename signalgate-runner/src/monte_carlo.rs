//! Monte Carlo forward simulation of geometric Brownian motion paths.
//!
//! Paths run in fixed-size chunks on rayon. Every chunk draws from its own
//! `StdRng` derived from `(master seed, "monte_carlo", chunk index)`, and
//! chunk results are concatenated in index order, so a given seed produces
//! identical output on any number of threads.

use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use signalgate_core::rng::RngHierarchy;
use signalgate_core::stats::{mean_f64, percentile_sorted, sorted_copy, std_dev};

use crate::config::MonteCarloConfig;

const RNG_STREAM: &str = "monte_carlo";

/// How the per-step drift is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftModel {
    /// Mean historical return, Itô-corrected by σ²/2.
    #[default]
    Historical,
    /// Zero expected return; the log drift is just −σ²/2.
    RiskNeutral,
}

/// Aggregated outcome of one simulation run. Percentages are in points
/// (5.0 = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub scenarios: usize,
    pub horizon: usize,
    pub drift_model: DriftModel,
    /// Master seed; rerunning with it reproduces this result.
    pub seed: u64,
    pub start_price: f64,
    /// Per-step arithmetic drift used (0 under `RiskNeutral`).
    pub mu: f64,
    /// Per-step volatility of log returns.
    pub sigma: f64,
    pub expected_return_pct: f64,
    /// Share of paths ending above the start price.
    pub profit_probability_pct: f64,
    pub p5_return_pct: f64,
    pub p95_return_pct: f64,
    pub median_return_pct: f64,
    pub expected_price: f64,
    pub median_price: f64,
    /// Standard error of `expected_return_pct`.
    pub std_error_pct: f64,
}

impl MonteCarloResult {
    /// Probability (0..=100) that a position in `direction_sign` (+1 long,
    /// −1 short) ends in profit.
    pub fn directional_profit_probability(&self, direction_sign: f64) -> f64 {
        if direction_sign < 0.0 {
            100.0 - self.profit_probability_pct
        } else {
            self.profit_probability_pct
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.start_price,
            self.mu,
            self.sigma,
            self.expected_return_pct,
            self.profit_probability_pct,
            self.p5_return_pct,
            self.p95_return_pct,
            self.median_return_pct,
            self.expected_price,
            self.median_price,
            self.std_error_pct,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Simulate `config.scenarios` paths forward from the last close.
///
/// Drift and volatility come from the last `config.lookback` log returns.
/// Returns `None` when fewer than `config.min_returns` usable returns exist
/// or the inputs are not finite.
pub fn simulate(
    closes: &[f64],
    config: &MonteCarloConfig,
    hierarchy: &RngHierarchy,
) -> Option<MonteCarloResult> {
    let start_price = *closes.last()?;
    if !(start_price.is_finite() && start_price > 0.0) {
        warn!(start_price, "monte carlo skipped: non-positive start price");
        return None;
    }

    let window_start = closes.len().saturating_sub(config.lookback + 1);
    let window = &closes[window_start..];
    let log_returns: Vec<f64> = window
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite())
        .collect();
    if log_returns.len() < config.min_returns {
        debug!(
            returns = log_returns.len(),
            required = config.min_returns,
            "monte carlo skipped: not enough returns"
        );
        return None;
    }

    let sigma = std_dev(&log_returns);
    let mu = match config.drift_model {
        DriftModel::Historical => {
            let simple: Vec<f64> = log_returns.iter().map(|r| r.exp_m1()).collect();
            mean_f64(&simple)
        }
        DriftModel::RiskNeutral => 0.0,
    };
    let step_drift = mu - 0.5 * sigma * sigma;
    if !(step_drift.is_finite() && sigma.is_finite()) {
        warn!(mu, sigma, "monte carlo skipped: non-finite parameters");
        return None;
    }

    let chunk_size = config.chunk_size.max(1);
    let chunk_count = config.scenarios.div_ceil(chunk_size);
    let clamp = config.exponent_clamp;
    let horizon = config.horizon;

    let returns_pct: Vec<f64> = (0..chunk_count)
        .into_par_iter()
        .map(|chunk| {
            let mut rng = hierarchy.rng_for(RNG_STREAM, chunk as u64);
            let paths = chunk_size.min(config.scenarios - chunk * chunk_size);
            (0..paths)
                .map(|_| {
                    let mut log_growth = 0.0;
                    for _ in 0..horizon {
                        let z: f64 = rng.sample(StandardNormal);
                        log_growth += (step_drift + sigma * z).clamp(-clamp, clamp);
                    }
                    log_growth.exp_m1() * 100.0
                })
                .collect::<Vec<f64>>()
        })
        .collect::<Vec<Vec<f64>>>()
        .into_iter()
        .flatten()
        .collect();

    let n = returns_pct.len();
    let expected_return_pct = mean_f64(&returns_pct);
    let profitable = returns_pct.iter().filter(|&&r| r > 0.0).count();
    let sorted = sorted_copy(&returns_pct);
    let median_return_pct = percentile_sorted(&sorted, 50.0);

    let result = MonteCarloResult {
        scenarios: n,
        horizon,
        drift_model: config.drift_model,
        seed: hierarchy.master_seed(),
        start_price,
        mu,
        sigma,
        expected_return_pct,
        profit_probability_pct: profitable as f64 / n as f64 * 100.0,
        p5_return_pct: percentile_sorted(&sorted, 5.0),
        p95_return_pct: percentile_sorted(&sorted, 95.0),
        median_return_pct,
        expected_price: start_price * (1.0 + expected_return_pct / 100.0),
        median_price: start_price * (1.0 + median_return_pct / 100.0),
        std_error_pct: std_dev(&returns_pct) / (n as f64).sqrt(),
    };
    debug!(
        scenarios = n,
        seed = result.seed,
        expected = result.expected_return_pct,
        profit_probability = result.profit_probability_pct,
        "monte carlo complete"
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavy_closes(n: usize, drift: f64) -> Vec<f64> {
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                let step = drift + 0.01 * ((i as f64) * 1.7).sin();
                price *= 1.0 + step;
                price
            })
            .collect()
    }

    fn config(scenarios: usize) -> MonteCarloConfig {
        MonteCarloConfig {
            scenarios,
            seed: Some(11),
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn too_few_returns_is_undefined() {
        let closes = wavy_closes(8, 0.0);
        assert!(simulate(&closes, &config(100), &RngHierarchy::new(1)).is_none());
        assert!(simulate(&[], &config(100), &RngHierarchy::new(1)).is_none());
    }

    #[test]
    fn same_seed_same_result() {
        let closes = wavy_closes(150, 0.001);
        let a = simulate(&closes, &config(2_500), &RngHierarchy::new(42)).unwrap();
        let b = simulate(&closes, &config(2_500), &RngHierarchy::new(42)).unwrap();
        assert_eq!(a, b);
        let c = simulate(&closes, &config(2_500), &RngHierarchy::new(43)).unwrap();
        assert_ne!(a.expected_return_pct, c.expected_return_pct);
    }

    #[test]
    fn identical_across_thread_counts() {
        let closes = wavy_closes(150, 0.001);
        let cfg = config(5_000);
        let run = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| simulate(&closes, &cfg, &RngHierarchy::new(9)).unwrap())
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn outputs_are_bounded_and_ordered() {
        let closes = wavy_closes(150, -0.002);
        let r = simulate(&closes, &config(3_000), &RngHierarchy::new(5)).unwrap();
        assert_eq!(r.scenarios, 3_000);
        assert!((0.0..=100.0).contains(&r.profit_probability_pct));
        assert!(r.p5_return_pct <= r.median_return_pct);
        assert!(r.median_return_pct <= r.p95_return_pct);
        assert!(r.is_finite());
        assert_eq!(
            r.directional_profit_probability(-1.0),
            100.0 - r.profit_probability_pct
        );
    }

    #[test]
    fn partial_last_chunk_is_counted() {
        let closes = wavy_closes(120, 0.0);
        let cfg = MonteCarloConfig {
            scenarios: 2_345,
            chunk_size: 1_000,
            ..config(0)
        };
        let r = simulate(&closes, &cfg, &RngHierarchy::new(3)).unwrap();
        assert_eq!(r.scenarios, 2_345);
    }

    #[test]
    fn risk_neutral_expectation_is_near_zero() {
        let closes = wavy_closes(150, 0.004);
        let cfg = MonteCarloConfig {
            drift_model: DriftModel::RiskNeutral,
            ..config(20_000)
        };
        let r = simulate(&closes, &cfg, &RngHierarchy::new(17)).unwrap();
        assert_eq!(r.mu, 0.0);
        assert!(
            r.expected_return_pct.abs() < 4.0 * r.std_error_pct + 1e-9,
            "expected {} se {}",
            r.expected_return_pct,
            r.std_error_pct
        );
    }

    #[test]
    fn standard_error_shrinks_with_scenarios() {
        let closes = wavy_closes(150, 0.001);
        let errors: Vec<f64> = [100, 1_000, 10_000]
            .into_iter()
            .map(|n| {
                simulate(&closes, &config(n), &RngHierarchy::new(21))
                    .unwrap()
                    .std_error_pct
            })
            .collect();
        assert!(errors[0] > errors[1], "{errors:?}");
        assert!(errors[1] > errors[2], "{errors:?}");
    }

    #[test]
    fn flat_history_gives_degenerate_paths() {
        let closes = vec![50.0; 40];
        let r = simulate(&closes, &config(500), &RngHierarchy::new(1)).unwrap();
        assert_eq!(r.sigma, 0.0);
        assert_eq!(r.expected_return_pct, 0.0);
        assert_eq!(r.profit_probability_pct, 0.0);
    }
}
