//! Domain types for SignalGate

pub mod bar;
pub mod pattern;
pub mod series;
pub mod timeframe;

pub use bar::PriceBar;
pub use pattern::{Direction, PatternBias};
pub use series::OhlcvSeries;
pub use timeframe::{ParseTimeframeError, Timeframe};
