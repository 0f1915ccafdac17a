//! SignalGate Runner: evidence fusion, risk analytics, and the execution gate.
//!
//! This crate builds on `signalgate-core` to turn validated bars into a
//! trade recommendation that must earn its way to execution:
//! - Bayesian fusion of indicator and pattern evidence across timeframes
//! - Risk profile (VaR/CVaR, Sharpe/Sortino/Calmar, drawdown, Kelly)
//! - Seeded, chunk-parallel Monte Carlo price simulation
//! - Recommendation synthesis with ATR-based stop and target levels
//! - Six-stage validation gate (A–F) deciding execution readiness
//! - Risk-budgeted position sizing with a Kelly reference size
//! - Versioned prior-accuracy table shared across concurrent analyses
//! - Historical replay with fees and slippage, go/no-go and scenario robustness verdicts

pub mod analyze;
pub mod backtest;
pub mod config;
pub mod error;
pub mod fusion;
pub mod gate;
pub mod metrics;
pub mod monte_carlo;
pub mod priors;
pub mod recommendation;
pub mod risk_profile;
pub mod sizing;
pub mod tail_metrics;

pub use analyze::{analyze, AnalysisInput, AnalysisOutcome, Analyzer, FetchRequest};
pub use backtest::{
    backtest, run_scenarios, standard_scenarios, BacktestInput, BacktestReport, BacktestStats,
    ExitReason, Robustness, Scenario, ScenarioSummary, StrategyAssessment, TradeRecord, Verdict,
};
pub use config::{
    AnalysisConfig, BacktestConfig, ConfigError, GateConfig, MonteCarloConfig, RiskConfig,
    SignalConfig,
};
pub use error::{AnalysisError, BacktestError};
pub use fusion::{Evidence, FusionResult, SignalFusion, SignalStrength, TimeframeFusion};
pub use gate::{
    GateContext, GateStage, StageOutcome, StageRecord, ValidationGate, ValidationReport,
};
pub use monte_carlo::{simulate, DriftModel, MonteCarloResult};
pub use priors::{EvidenceSource, PriorAccuracyTable, PriorStore};
pub use recommendation::{
    price_levels, Action, PriceLevels, Recommendation, RecommendationSynthesizer, SynthesisInput,
};
pub use risk_profile::{RiskAnalytics, RiskProfile};
pub use sizing::{PositionSizer, PositionSizing};
pub use tail_metrics::TailMetrics;
