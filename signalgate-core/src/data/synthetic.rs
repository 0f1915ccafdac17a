//! Deterministic synthetic series for tests, benchmarks and dry runs.
//!
//! Close-to-close move sizes follow a log-uniform law (so their leading digits
//! are Benford-distributed, as real price moves roughly are) and move signs
//! follow a low-discrepancy sequence whose density is `up_fraction`. Wicks and
//! volume come from a seeded `StdRng`. The same builder always yields the same
//! bars.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::{OhlcvSeries, PriceBar, Timeframe};
use crate::rng::RngHierarchy;

/// Fractional part of the golden ratio; drives move magnitudes.
const MAGNITUDE_STEP: f64 = 0.618_033_988_749_894_9;
/// Fractional part of sqrt(2); drives move signs.
const SIGN_STEP: f64 = 0.414_213_562_373_095_1;

/// Builder for a deterministic OHLCV series ending at `as_of`.
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    symbol: String,
    timeframe: Timeframe,
    as_of: DateTime<Utc>,
    bars: usize,
    start_price: f64,
    move_unit: f64,
    up_fraction: f64,
    seed: u64,
}

impl SyntheticSeries {
    /// 300 bars from 100.0, smallest move 0.2% of the start price, no trend.
    /// The last bar closes exactly at `as_of`.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            as_of,
            bars: 300,
            start_price: 100.0,
            move_unit: 0.002,
            up_fraction: 0.5,
            seed: 7,
        }
    }

    pub fn bars(mut self, bars: usize) -> Self {
        self.bars = bars;
        self
    }

    pub fn start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    /// Smallest absolute move as a fraction of the start price. Moves span one decade above it.
    pub fn move_unit(mut self, unit: f64) -> Self {
        self.move_unit = unit;
        self
    }

    /// Share of bars that close higher than they opened.
    pub fn up_fraction(mut self, fraction: f64) -> Self {
        self.up_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn generate(&self) -> OhlcvSeries {
        let hierarchy = RngHierarchy::new(self.seed);
        let mut rng = hierarchy.rng_for("synthetic", 0);
        let magnitude_offset: f64 = rng.gen();
        let sign_offset: f64 = rng.gen();

        let unit = self.start_price * self.move_unit;
        let first_open = self.as_of - self.timeframe.duration() * self.bars as i32;

        let mut bars = Vec::with_capacity(self.bars);
        let mut price = self.start_price;
        for i in 0..self.bars {
            let k = i as f64 + 1.0;
            let exponent = (k * MAGNITUDE_STEP + magnitude_offset).fract();
            let magnitude = unit * 10f64.powf(exponent);
            let up = (k * SIGN_STEP + sign_offset).fract() < self.up_fraction;

            let open = price;
            let close = if up { open + magnitude } else { (open - magnitude).max(unit) };
            let high = open.max(close) + rng.gen_range(0.0..0.5) * unit;
            let low = (open.min(close) - rng.gen_range(0.0..0.5) * unit).max(unit * 0.5);
            let volume = rng.gen_range(500.0..5_000.0);

            bars.push(PriceBar {
                timestamp: first_open + self.timeframe.duration() * i as i32,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
        }

        OhlcvSeries::new(self.symbol.clone(), self.timeframe, bars)
    }
}

/// Build a series from raw closes with plausible OHLV, the last bar closing at `as_of`.
///
/// open = previous close (or close for the first bar), high/low = max/min(open, close)
/// widened by 0.1% of close, volume = 1000.
pub fn series_from_closes(
    symbol: &str,
    timeframe: Timeframe,
    closes: &[f64],
    as_of: DateTime<Utc>,
) -> OhlcvSeries {
    let first_open = as_of - timeframe.duration() * closes.len() as i32;
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let pad = close.abs() * 0.001;
            PriceBar {
                timestamp: first_open + timeframe.duration() * i as i32,
                open,
                high: open.max(close) + pad,
                low: open.min(close) - pad,
                close,
                volume: 1000.0,
            }
        })
        .collect();
    OhlcvSeries::new(symbol, timeframe, bars)
}
