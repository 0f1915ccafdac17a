//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over `k_period` bars.
//! %D = SMA(%K, d_period).
//! A flat window (highest_high == lowest_low) has no range to position the close
//! in; %K is neutral 50 there instead of 0/0.

use super::sma::sma_of_series;
use super::Indicator;
use crate::domain::PriceBar;

/// Which stochastic line to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(line: StochasticLine, k_period: usize, d_period: usize) -> Self {
        assert!(k_period >= 1 && d_period >= 1, "Stochastic periods must be >= 1");
        let label = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
        };
        Self {
            k_period,
            d_period,
            line,
            name: format!("stoch_{label}_{k_period}_{d_period}"),
        }
    }

    pub fn k(k_period: usize, d_period: usize) -> Self {
        Self::new(StochasticLine::K, k_period, d_period)
    }

    pub fn d(k_period: usize, d_period: usize) -> Self {
        Self::new(StochasticLine::D, k_period, d_period)
    }

    fn percent_k(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.k_period {
            return result;
        }
        for i in (self.k_period - 1)..n {
            let window = &bars[i + 1 - self.k_period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let close = bars[i].close;
            if !(highest.is_finite() && lowest.is_finite() && close.is_finite()) {
                continue;
            }
            let range = highest - lowest;
            result[i] = if range <= 0.0 {
                50.0
            } else {
                (100.0 * (close - lowest) / range).clamp(0.0, 100.0)
            };
        }
        result
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            StochasticLine::K => self.k_period - 1,
            StochasticLine::D => self.k_period + self.d_period - 2,
        }
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let k = self.percent_k(bars);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => sma_of_series(&k, self.d_period),
        }
    }
}
