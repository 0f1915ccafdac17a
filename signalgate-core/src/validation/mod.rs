//! Data integrity validation.
//!
//! `DataValidator` runs five ordered check groups over a series:
//! structural, price logic, statistical anomaly, freshness, completeness.
//! The first group that produces a fatal issue stops validation; later groups
//! never see data that failed an earlier one. The verdict is a pure function
//! of the series, the configuration and the supplied `now`.

pub mod anomaly;
pub mod benford;
pub mod checks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::OhlcvSeries;

pub use benford::{benford_test, first_digit, BenfordResult};

/// Freshness tolerance for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessMode {
    /// Latest bar must have closed within 5 minutes.
    Strict,
    /// Latest bar must have closed within 15 minutes.
    #[default]
    Normal,
}

impl FreshnessMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            FreshnessMode::Strict
        } else {
            FreshnessMode::Normal
        }
    }

    pub fn max_age(self) -> chrono::Duration {
        match self {
            FreshnessMode::Strict => chrono::Duration::minutes(5),
            FreshnessMode::Normal => chrono::Duration::minutes(15),
        }
    }
}

/// Thresholds for every check group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataValidationConfig {
    /// Minimum number of bars (never below 20).
    pub min_bars: usize,
    /// Largest allowed single-bar close-to-close move, as a fraction.
    pub max_bar_jump: f64,
    /// Returns further than this many standard deviations from the mean are flagged.
    pub z_score_threshold: f64,
    /// Volumes above Q3 + k * IQR are flagged.
    pub volume_iqr_multiplier: f64,
    /// Benford p-values below this flag the price moves; the series fails
    /// only when another synthetic-data signal corroborates the miss.
    pub benford_alpha: f64,
    /// Fewer usable digits than this skips the Benford test.
    pub benford_min_digits: usize,
    /// Only the most recent moves enter the Benford test.
    pub benford_window: usize,
    /// A run of this many identical non-zero close-to-close steps is synthetic.
    pub max_arithmetic_run: usize,
    /// An identical-step run this long corroborates a Benford miss.
    pub benford_corroborating_run: usize,
    /// A strictly monotone close run this long is flagged.
    pub monotone_run_warning: usize,
    /// This many identical consecutive closes is a frozen feed.
    pub max_frozen_run: usize,
    /// Share of missing bars (timestamp gaps) above which the series fails.
    pub max_missing_ratio: f64,
    /// How far a bar timestamp may lie in the future, in seconds.
    pub future_tolerance_secs: i64,
}

impl Default for DataValidationConfig {
    fn default() -> Self {
        Self {
            min_bars: 20,
            max_bar_jump: 0.50,
            z_score_threshold: 5.0,
            volume_iqr_multiplier: 3.0,
            benford_alpha: 0.01,
            benford_min_digits: 15,
            benford_window: 100,
            max_arithmetic_run: 8,
            benford_corroborating_run: 3,
            monotone_run_warning: 15,
            max_frozen_run: 10,
            max_missing_ratio: 0.05,
            future_tolerance_secs: 60,
        }
    }
}

/// Check group that raised an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Structural,
    PriceLogic,
    Anomaly,
    Freshness,
    Completeness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Fatal,
}

/// One finding of the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub category: CheckCategory,
    pub severity: Severity,
    pub message: String,
}

impl DataIssue {
    pub fn fatal(category: CheckCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            severity: Severity::Fatal,
            message: message.into(),
        }
    }

    pub fn warning(category: CheckCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Outcome of validating one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataVerdict {
    pub symbol: String,
    pub timeframe: crate::domain::Timeframe,
    pub passed: bool,
    pub issues: Vec<DataIssue>,
    /// Seconds since the latest bar closed (0 while it is still forming).
    pub age_secs: Option<i64>,
}

impl DataVerdict {
    /// Messages of fatal issues.
    pub fn failures(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.is_fatal())
            .map(|i| i.message.as_str())
            .collect()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| !i.is_fatal())
            .map(|i| i.message.as_str())
            .collect()
    }

    /// Whether the freshness group ran and produced no fatal issue.
    pub fn is_fresh(&self) -> bool {
        self.passed
            || (self.age_secs.is_some()
                && !self
                    .issues
                    .iter()
                    .any(|i| i.is_fatal() && i.category == CheckCategory::Freshness))
    }
}

const CHECK_ORDER: [CheckCategory; 5] = [
    CheckCategory::Structural,
    CheckCategory::PriceLogic,
    CheckCategory::Anomaly,
    CheckCategory::Freshness,
    CheckCategory::Completeness,
];

/// Structural and statistical integrity checks on a price-bar series.
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: DataValidationConfig,
    mode: FreshnessMode,
}

impl DataValidator {
    pub fn new(config: DataValidationConfig, mode: FreshnessMode) -> Self {
        Self { config, mode }
    }

    pub fn config(&self) -> &DataValidationConfig {
        &self.config
    }

    pub fn mode(&self) -> FreshnessMode {
        self.mode
    }

    /// Validate a series as of `now`.
    pub fn validate(&self, series: &OhlcvSeries, now: DateTime<Utc>) -> DataVerdict {
        let mut issues = Vec::new();
        let mut age_secs = None;

        for category in CHECK_ORDER {
            let before = issues.len();
            match category {
                CheckCategory::Structural => checks::structural(series, &self.config, &mut issues),
                CheckCategory::PriceLogic => checks::price_logic(series, &self.config, &mut issues),
                CheckCategory::Anomaly => {
                    anomaly::statistical_anomalies(series, &self.config, &mut issues)
                }
                CheckCategory::Freshness => {
                    checks::freshness(series, &self.config, self.mode, now, &mut issues);
                    age_secs = series
                        .last_close_time()
                        .map(|close| (now - close).num_seconds().max(0));
                }
                CheckCategory::Completeness => {
                    checks::completeness(series, &self.config, &mut issues)
                }
            }
            if issues[before..].iter().any(DataIssue::is_fatal) {
                break;
            }
        }

        let passed = !issues.iter().any(DataIssue::is_fatal);
        let verdict = DataVerdict {
            symbol: series.symbol.clone(),
            timeframe: series.timeframe,
            passed,
            issues,
            age_secs,
        };

        if passed {
            debug!(
                symbol = %verdict.symbol,
                timeframe = %verdict.timeframe,
                warnings = verdict.warnings().len(),
                "series passed integrity validation"
            );
        } else {
            warn!(
                symbol = %verdict.symbol,
                timeframe = %verdict.timeframe,
                reasons = ?verdict.failures(),
                "series failed integrity validation"
            );
        }
        verdict
    }
}
