//! Per-timeframe indicator engine.
//!
//! Runs every indicator over a validated series, keeps the latest value of
//! each, and applies post-computation guards. A reading is never a numeric
//! guess: short history yields `InsufficientData`, an out-of-range value
//! yields `Anomalous`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    Atr, Bollinger, BollingerBand, Ema, Indicator, Macd, MacdLine, Rsi, Stochastic,
    StochasticLine, VolumeSlope, VolumeTotal,
};
use crate::domain::{OhlcvSeries, PriceBar, Timeframe};

/// |MACD| at or above this share of the close is treated as anomalous.
const MACD_PRICE_SHARE_LIMIT: f64 = 0.10;

/// Indicator periods and multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub stochastic_k: usize,
    pub stochastic_d: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            ema_fast: 50,
            ema_slow: 200,
            stochastic_k: 14,
            stochastic_d: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid indicator parameters: {0}")]
pub struct InvalidIndicatorParams(pub String);

impl IndicatorParams {
    /// Reject parameters the indicator constructors would panic on.
    pub fn check(&self) -> Result<(), InvalidIndicatorParams> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("atr_period", self.atr_period),
            ("bollinger_period", self.bollinger_period),
            ("ema_fast", self.ema_fast),
            ("ema_slow", self.ema_slow),
            ("stochastic_k", self.stochastic_k),
            ("stochastic_d", self.stochastic_d),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(InvalidIndicatorParams(format!("{name} must be >= 1")));
        }
        if self.macd_slow <= self.macd_fast {
            return Err(InvalidIndicatorParams(
                "macd_slow must exceed macd_fast".into(),
            ));
        }
        if self.ema_slow <= self.ema_fast {
            return Err(InvalidIndicatorParams("ema_slow must exceed ema_fast".into()));
        }
        if !(self.bollinger_multiplier.is_finite() && self.bollinger_multiplier > 0.0) {
            return Err(InvalidIndicatorParams(
                "bollinger_multiplier must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    Atr,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    EmaFast,
    EmaSlow,
    StochasticK,
    StochasticD,
    ObvSlope,
    VptSlope,
}

impl IndicatorKind {
    /// Readings that must all be values for a set to count as valid.
    pub const CORE: [IndicatorKind; 8] = [
        IndicatorKind::Rsi,
        IndicatorKind::MacdLine,
        IndicatorKind::MacdSignal,
        IndicatorKind::MacdHistogram,
        IndicatorKind::Atr,
        IndicatorKind::BollingerUpper,
        IndicatorKind::BollingerMiddle,
        IndicatorKind::BollingerLower,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::MacdLine => "macd_line",
            IndicatorKind::MacdSignal => "macd_signal",
            IndicatorKind::MacdHistogram => "macd_histogram",
            IndicatorKind::Atr => "atr",
            IndicatorKind::BollingerUpper => "bollinger_upper",
            IndicatorKind::BollingerMiddle => "bollinger_middle",
            IndicatorKind::BollingerLower => "bollinger_lower",
            IndicatorKind::EmaFast => "ema_fast",
            IndicatorKind::EmaSlow => "ema_slow",
            IndicatorKind::StochasticK => "stochastic_k",
            IndicatorKind::StochasticD => "stochastic_d",
            IndicatorKind::ObvSlope => "obv_slope",
            IndicatorKind::VptSlope => "vpt_slope",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest value of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorReading {
    Value(f64),
    InsufficientData { required: usize, available: usize },
    Anomalous { value: f64, reason: String },
}

impl IndicatorReading {
    /// The usable value, if any. Anomalous and insufficient readings have none.
    pub fn value(&self) -> Option<f64> {
        match self {
            IndicatorReading::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, IndicatorReading::Value(_))
    }

    fn anomalous(value: f64, reason: impl Into<String>) -> Self {
        IndicatorReading::Anomalous {
            value,
            reason: reason.into(),
        }
    }
}

/// Guarded latest indicator readings for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub timeframe: Timeframe,
    pub last_close: Option<f64>,
    pub bars_used: usize,
    pub readings: BTreeMap<IndicatorKind, IndicatorReading>,
    pub valid: bool,
}

impl IndicatorSet {
    pub fn get(&self, kind: IndicatorKind) -> Option<&IndicatorReading> {
        self.readings.get(&kind)
    }

    pub fn value(&self, kind: IndicatorKind) -> Option<f64> {
        self.get(kind).and_then(IndicatorReading::value)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Anomalous readings with their reasons.
    pub fn anomalies(&self) -> Vec<(IndicatorKind, &str)> {
        self.readings
            .iter()
            .filter_map(|(kind, reading)| match reading {
                IndicatorReading::Anomalous { reason, .. } => Some((*kind, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    fn core_complete(readings: &BTreeMap<IndicatorKind, IndicatorReading>) -> bool {
        IndicatorKind::CORE
            .iter()
            .all(|k| readings.get(k).is_some_and(IndicatorReading::is_value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn compute(&self, series: &OhlcvSeries) -> IndicatorSet {
        let p = &self.params;
        let bars = series.bars.as_slice();
        let last_close = series.last_close();
        let mut readings = BTreeMap::new();

        let rsi = Rsi::new(p.rsi_period);
        readings.insert(IndicatorKind::Rsi, latest(&rsi, bars));

        let macd = Macd::new(MacdLine::Line, p.macd_fast, p.macd_slow, p.macd_signal);
        let macd_signal = Macd::new(MacdLine::Signal, p.macd_fast, p.macd_slow, p.macd_signal);
        let (line, signal, histogram) = macd.compute_all(bars);
        readings.insert(
            IndicatorKind::MacdLine,
            latest_of(&line, macd.required_bars(), bars.len()),
        );
        readings.insert(
            IndicatorKind::MacdSignal,
            latest_of(&signal, macd_signal.required_bars(), bars.len()),
        );
        readings.insert(
            IndicatorKind::MacdHistogram,
            latest_of(&histogram, macd_signal.required_bars(), bars.len()),
        );

        readings.insert(IndicatorKind::Atr, latest(&Atr::new(p.atr_period), bars));

        let bands = [
            (IndicatorKind::BollingerUpper, BollingerBand::Upper),
            (IndicatorKind::BollingerMiddle, BollingerBand::Middle),
            (IndicatorKind::BollingerLower, BollingerBand::Lower),
        ];
        for (kind, band) in bands {
            let bb = Bollinger::new(band, p.bollinger_period, p.bollinger_multiplier);
            readings.insert(kind, latest(&bb, bars));
        }

        readings.insert(IndicatorKind::EmaFast, latest(&Ema::new(p.ema_fast), bars));
        readings.insert(IndicatorKind::EmaSlow, latest(&Ema::new(p.ema_slow), bars));

        let stoch_k = Stochastic::new(StochasticLine::K, p.stochastic_k, p.stochastic_d);
        let stoch_d = Stochastic::new(StochasticLine::D, p.stochastic_k, p.stochastic_d);
        readings.insert(IndicatorKind::StochasticK, latest(&stoch_k, bars));
        readings.insert(IndicatorKind::StochasticD, latest(&stoch_d, bars));

        for (kind, total) in [
            (IndicatorKind::ObvSlope, VolumeTotal::Obv),
            (IndicatorKind::VptSlope, VolumeTotal::Vpt),
        ] {
            readings.insert(kind, latest(&VolumeSlope::new(total, p.rsi_period), bars));
        }

        apply_guards(&mut readings, last_close);

        let valid = IndicatorSet::core_complete(&readings);
        let set = IndicatorSet {
            timeframe: series.timeframe,
            last_close,
            bars_used: bars.len(),
            readings,
            valid,
        };

        for (kind, reason) in set.anomalies() {
            warn!(
                symbol = %series.symbol,
                timeframe = %series.timeframe,
                indicator = %kind,
                reason,
                "indicator reading flagged anomalous"
            );
        }
        debug!(
            symbol = %series.symbol,
            timeframe = %series.timeframe,
            bars = set.bars_used,
            valid = set.valid,
            rsi = ?set.value(IndicatorKind::Rsi),
            atr = ?set.value(IndicatorKind::Atr),
            "indicators computed"
        );
        set
    }
}

fn latest(indicator: &dyn Indicator, bars: &[PriceBar]) -> IndicatorReading {
    let values = indicator.compute(bars);
    latest_of(&values, indicator.required_bars(), bars.len())
}

fn latest_of(values: &[f64], required: usize, available: usize) -> IndicatorReading {
    if available < required {
        return IndicatorReading::InsufficientData {
            required,
            available,
        };
    }
    match values.last() {
        Some(v) if v.is_finite() => IndicatorReading::Value(*v),
        Some(v) => IndicatorReading::anomalous(*v, "non-finite output"),
        None => IndicatorReading::InsufficientData {
            required,
            available,
        },
    }
}

/// Post-computation range checks. Values that break an indicator's own
/// bounds are downgraded to `Anomalous`.
fn apply_guards(readings: &mut BTreeMap<IndicatorKind, IndicatorReading>, last_close: Option<f64>) {
    for kind in [
        IndicatorKind::Rsi,
        IndicatorKind::StochasticK,
        IndicatorKind::StochasticD,
    ] {
        flag_if(readings, kind, |v| !(0.0..=100.0).contains(&v), "outside [0, 100]");
    }

    flag_if(readings, IndicatorKind::Atr, |v| v < 0.0, "negative ATR");

    let upper = readings
        .get(&IndicatorKind::BollingerUpper)
        .and_then(IndicatorReading::value);
    let lower = readings
        .get(&IndicatorKind::BollingerLower)
        .and_then(IndicatorReading::value);
    if let (Some(upper), Some(lower)) = (upper, lower) {
        if upper <= lower {
            flag_if(readings, IndicatorKind::BollingerUpper, |_| true, "bands collapsed");
            flag_if(readings, IndicatorKind::BollingerLower, |_| true, "bands collapsed");
        }
    }

    if let Some(close) = last_close.filter(|c| c.is_finite() && *c > 0.0) {
        let limit = MACD_PRICE_SHARE_LIMIT * close;
        for kind in [
            IndicatorKind::MacdLine,
            IndicatorKind::MacdSignal,
            IndicatorKind::MacdHistogram,
        ] {
            flag_if(readings, kind, |v| v.abs() >= limit, "exceeds 10% of price");
        }
    }
}

fn flag_if(
    readings: &mut BTreeMap<IndicatorKind, IndicatorReading>,
    kind: IndicatorKind,
    predicate: impl Fn(f64) -> bool,
    reason: &str,
) {
    if let Some(reading) = readings.get_mut(&kind) {
        if let IndicatorReading::Value(v) = *reading {
            if predicate(v) {
                *reading = IndicatorReading::anomalous(v, reason);
            }
        }
    }
}
