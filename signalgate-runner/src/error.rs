//! Hard errors returned to the caller.
//!
//! Market conditions (bad data, weak evidence, gate blocks) are never errors;
//! they come back as data in `AnalysisOutcome`. Only caller misuse and
//! collaborator failures end up here.

use thiserror::Error;

use signalgate_core::data::ProviderError;
use signalgate_core::domain::Timeframe;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("account balance must be positive and finite, got {0}")]
    InvalidBalance(f64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("market data provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors that stop a historical replay before it produces a report.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("confirmation timeframe {confirmation} is not a whole multiple of {primary}")]
    IncompatibleTimeframe {
        primary: Timeframe,
        confirmation: Timeframe,
    },

    #[error("replay needs {required} complete {timeframe} bars before the first decision, got {available}")]
    InsufficientHistory {
        timeframe: Timeframe,
        required: usize,
        available: usize,
    },

    #[error("no scenarios to replay")]
    NoScenarios,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        assert!(AnalysisError::InvalidBalance(-5.0)
            .to_string()
            .contains("-5"));
        let err: AnalysisError = ProviderError::SymbolNotFound {
            symbol: "DOGE/XYZ".into(),
        }
        .into();
        assert!(err.to_string().contains("DOGE/XYZ"));
    }

    #[test]
    fn backtest_errors_name_the_timeframes() {
        let err = BacktestError::IncompatibleTimeframe {
            primary: Timeframe::H4,
            confirmation: Timeframe::H1,
        };
        assert!(err.to_string().contains("1h is not a whole multiple of 4h"));
        let err = BacktestError::InsufficientHistory {
            timeframe: Timeframe::H4,
            required: 120,
            available: 30,
        };
        assert!(err.to_string().contains("120 complete 4h bars"));
    }
}
