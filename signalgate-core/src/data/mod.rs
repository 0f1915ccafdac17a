//! Collaborator interfaces and synthetic data

pub mod provider;
pub mod synthetic;

pub use provider::{MarketDataProvider, NoPatterns, PatternRecognition, ProviderError};
pub use synthetic::{series_from_closes, SyntheticSeries};
