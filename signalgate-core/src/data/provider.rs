//! Collaborator traits and structured error types.
//!
//! Market data and chart-pattern detection live outside the analysis core.
//! These traits let callers plug in exchange clients (or mocks for tests)
//! without the core knowing about network I/O.

use thiserror::Error;

use crate::domain::{OhlcvSeries, PatternBias, Timeframe};

/// Structured error types for collaborator failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("timeframe {timeframe} not supported for {symbol}")]
    UnsupportedTimeframe { symbol: String, timeframe: Timeframe },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("pattern recognition failed: {0}")]
    PatternRecognition(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Source of OHLCV series (exchange client, cache, replay file).
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the most recent `limit` bars for a symbol on one timeframe.
    fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<OhlcvSeries, ProviderError>;
}

/// Geometric chart-pattern detector, consumed only as a bias label plus confidence.
pub trait PatternRecognition: Send + Sync {
    fn detect_pattern_bias(&self, series: &OhlcvSeries) -> Result<PatternBias, ProviderError>;
}

/// Pattern collaborator that never has an opinion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPatterns;

impl PatternRecognition for NoPatterns {
    fn detect_pattern_bias(&self, _series: &OhlcvSeries) -> Result<PatternBias, ProviderError> {
        Ok(PatternBias::neutral())
    }
}
