//! OhlcvSeries: an ordered run of bars for one (symbol, timeframe).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PriceBar, Timeframe};

/// Ordered bars for one symbol on one timeframe.
///
/// Owned by the caller; the analysis pipeline only borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<PriceBar>,
}

impl OhlcvSeries {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Close time of the latest bar: its open timestamp plus one timeframe.
    pub fn last_close_time(&self) -> Option<DateTime<Utc>> {
        self.bars
            .last()
            .map(|b| b.timestamp + self.timeframe.duration())
    }

    /// Simple close-to-close returns. Pairs with a non-positive previous close yield 0.
    pub fn close_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| {
                if w[0].close > 0.0 {
                    (w[1].close - w[0].close) / w[0].close
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Log returns of closes. Pairs that are not strictly positive are skipped.
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .filter(|w| w[0].close > 0.0 && w[1].close > 0.0)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }
}
