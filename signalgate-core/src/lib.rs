//! SignalGate Core: market data model, integrity validation, indicator engine.
//!
//! This crate holds everything that looks at raw bars:
//! - Domain types (price bars, OHLCV series, timeframes, pattern bias)
//! - Collaborator traits for market data and pattern recognition
//! - `DataValidator`: structural, price-logic, anomaly (incl. Benford), freshness
//!   and completeness checks
//! - `IndicatorEngine`: guarded RSI/MACD/ATR/Bollinger/EMA/Stochastic/volume readings
//! - Deterministic RNG hierarchy shared with the Monte Carlo layer

pub mod data;
pub mod domain;
pub mod indicators;
pub mod rng;
pub mod stats;
pub mod validation;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across threads are Send + Sync.
    ///
    /// Multi-symbol orchestration runs analyses concurrently; if any of these
    /// stops being shareable the build breaks here.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::OhlcvSeries>();
        require_sync::<domain::OhlcvSeries>();
        require_send::<domain::PatternBias>();
        require_sync::<domain::PatternBias>();

        require_send::<validation::DataValidator>();
        require_sync::<validation::DataValidator>();
        require_send::<validation::DataVerdict>();
        require_sync::<validation::DataVerdict>();

        require_send::<indicators::IndicatorEngine>();
        require_sync::<indicators::IndicatorEngine>();
        require_send::<indicators::IndicatorSet>();
        require_sync::<indicators::IndicatorSet>();

        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
    }

    /// Collaborators are shared behind references across worker threads.
    #[test]
    fn collaborator_traits_are_object_safe_and_shareable() {
        fn _provider(_: &(dyn data::MarketDataProvider + Send + Sync)) {}
        fn _patterns(_: &(dyn data::PatternRecognition + Send + Sync)) {}
    }
}
