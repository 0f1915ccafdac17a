//! Historical replay of the analysis pipeline with a go/no-go assessment.
//!
//! The replayed series is the primary timeframe. Confirmation timeframes are
//! rebuilt from it by aggregating complete buckets, so every analysis sees
//! only bars that had closed by its decision time. Decisions are taken at
//! each close of the slowest timeframe and analyzed in parallel; positions
//! are then played forward bar by bar:
//!
//! - entry at the recommended price, slipped against the trade
//! - stop checked before target on every bar, gapped opens fill at the open
//! - timeout at the close after `max_holding_bars`
//! - any open position is closed at the last bar
//!
//! Fees are `trading_fee` of notional on both legs. One position at a time.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use signalgate_core::data::SyntheticSeries;
use signalgate_core::domain::{OhlcvSeries, PatternBias, PriceBar, Timeframe};
use signalgate_core::stats::mean_f64;

use crate::analyze::{analyze, AnalysisInput};
use crate::config::{AnalysisConfig, BacktestConfig, RiskConfig};
use crate::error::{AnalysisError, BacktestError};
use crate::gate::ValidationReport;
use crate::metrics::{max_drawdown, profit_factor, sharpe_ratio, sortino_ratio};
use crate::priors::PriorAccuracyTable;
use crate::recommendation::{Action, Recommendation};
use crate::risk_profile::RiskProfile;
use crate::sizing::PositionSizer;
use crate::tail_metrics::{compute_tail_metrics, TailMetrics};

// ─── Result types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Timeout,
    EndOfData,
}

/// One closed position. Prices are fills, after slippage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub side: Action,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Entry and exit fees together.
    pub fees: f64,
    /// Net of fees.
    pub pnl: f64,
    /// `pnl` as a percentage of entry notional.
    pub return_pct: f64,
    pub bars_held: usize,
    pub exit_reason: ExitReason,
    /// Recommendation confidence at entry.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// Performance of one replay. Ratios are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestStats {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    /// Largest peak-to-trough fall of the equity curve, as a positive percentage.
    pub max_drawdown_pct: f64,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Trades with `pnl <= 0`.
    pub losing_trades: usize,
    pub win_rate_pct: Option<f64>,
    pub avg_win_pct: Option<f64>,
    pub avg_loss_pct: Option<f64>,
    pub profit_factor: Option<f64>,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Share of replayed bars that closed with a position open.
    pub exposure_pct: f64,
    pub total_fees: f64,
    /// VaR/CVaR of the per-bar equity returns.
    pub tail: TailMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Profitable,
    Sharpe,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
    SufficientTrades,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    /// `None` when the measured quantity is undefined; such a criterion fails.
    pub value: Option<f64>,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Go,
    CautiousGo,
    NoGo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictConfidence {
    High,
    Medium,
}

/// Six pass/fail criteria and the verdict drawn from them.
///
/// GO needs a pass rate of at least 80% including profitability, Sharpe and
/// trade count. CAUTIOUS GO needs at least 60% including profitability.
/// Everything else is NO GO.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAssessment {
    pub criteria: Vec<CriterionResult>,
    pub passed_count: usize,
    pub pass_rate_pct: f64,
    pub verdict: Verdict,
    pub confidence: VerdictConfidence,
}

impl StrategyAssessment {
    pub fn evaluate(stats: &BacktestStats, config: &BacktestConfig) -> Self {
        let above = |value: Option<f64>, threshold: f64| value.is_some_and(|v| v > threshold);
        let trades = stats.total_trades as f64;
        let criteria = vec![
            CriterionResult {
                criterion: Criterion::Profitable,
                value: Some(stats.total_return_pct),
                threshold: 0.0,
                passed: stats.total_return_pct > 0.0,
            },
            CriterionResult {
                criterion: Criterion::Sharpe,
                value: stats.sharpe,
                threshold: config.min_sharpe,
                passed: above(stats.sharpe, config.min_sharpe),
            },
            CriterionResult {
                criterion: Criterion::WinRate,
                value: stats.win_rate_pct,
                threshold: config.min_win_rate_pct,
                passed: above(stats.win_rate_pct, config.min_win_rate_pct),
            },
            CriterionResult {
                criterion: Criterion::ProfitFactor,
                value: stats.profit_factor,
                threshold: config.min_profit_factor,
                passed: above(stats.profit_factor, config.min_profit_factor),
            },
            CriterionResult {
                criterion: Criterion::MaxDrawdown,
                value: Some(stats.max_drawdown_pct),
                threshold: config.max_drawdown_pct,
                passed: stats.max_drawdown_pct < config.max_drawdown_pct,
            },
            CriterionResult {
                criterion: Criterion::SufficientTrades,
                value: Some(trades),
                threshold: config.min_trades as f64,
                passed: stats.total_trades >= config.min_trades,
            },
        ];

        let passed = |c: Criterion| criteria.iter().any(|r| r.criterion == c && r.passed);
        let passed_count = criteria.iter().filter(|r| r.passed).count();
        let pass_rate_pct = passed_count as f64 / criteria.len() as f64 * 100.0;
        let (verdict, confidence) = if pass_rate_pct >= 80.0
            && passed(Criterion::Profitable)
            && passed(Criterion::Sharpe)
            && passed(Criterion::SufficientTrades)
        {
            (Verdict::Go, VerdictConfidence::High)
        } else if pass_rate_pct >= 60.0 && passed(Criterion::Profitable) {
            (Verdict::CautiousGo, VerdictConfidence::Medium)
        } else {
            (Verdict::NoGo, VerdictConfidence::High)
        };

        Self {
            criteria,
            passed_count,
            pass_rate_pct,
            verdict,
            confidence,
        }
    }
}

/// Everything one replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub confirmation_timeframes: Vec<Timeframe>,
    /// Analyses run.
    pub decisions: usize,
    /// Analyses the gate approved with a directional action.
    pub approved_signals: usize,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub stats: BacktestStats,
    pub assessment: StrategyAssessment,
    pub config_fingerprint: String,
}

// ─── Replay ─────────────────────────────────────────────────────────

/// What to replay.
#[derive(Debug, Clone, Copy)]
pub struct BacktestInput<'a> {
    /// Primary timeframe history, oldest bar first.
    pub series: &'a OhlcvSeries,
    /// Pattern evidence applied to every decision.
    pub pattern: PatternBias,
}

/// Analysis result at one decision bar.
#[derive(Debug, Clone)]
struct Decision {
    bar_index: usize,
    recommendation: Recommendation,
    validation: ValidationReport,
    risk_profile: Option<RiskProfile>,
}

/// Replay the pipeline over `input.series` and assess the result.
///
/// With a fixed Monte Carlo seed, decision `k` uses `seed + k`, so the whole
/// replay is reproducible.
pub fn backtest(
    input: &BacktestInput<'_>,
    config: &AnalysisConfig,
    priors: &PriorAccuracyTable,
) -> Result<BacktestReport, BacktestError> {
    config.validate()?;
    let fingerprint = config.fingerprint()?;
    let settings = &config.backtest;
    let primary = input.series;

    let mut confirmations = Vec::with_capacity(settings.confirmation_timeframes.len());
    for &timeframe in &settings.confirmation_timeframes {
        let primary_minutes = primary.timeframe.minutes();
        if timeframe.minutes() <= primary_minutes || timeframe.minutes() % primary_minutes != 0 {
            return Err(BacktestError::IncompatibleTimeframe {
                primary: primary.timeframe,
                confirmation: timeframe,
            });
        }
        confirmations.push(resample(primary, timeframe));
    }

    let points = decision_points(primary, &confirmations, settings.lookback_bars);
    if points.is_empty() {
        let slowest = confirmations
            .iter()
            .max_by_key(|s| s.timeframe)
            .unwrap_or(primary);
        return Err(BacktestError::InsufficientHistory {
            timeframe: slowest.timeframe,
            required: settings.lookback_bars,
            available: slowest.len(),
        });
    }
    info!(
        symbol = %primary.symbol,
        timeframe = %primary.timeframe,
        bars = primary.len(),
        decisions = points.len(),
        "backtest started"
    );

    let decisions = points
        .par_iter()
        .enumerate()
        .map(|(k, &bar_index)| {
            let mut decision_config = config.clone();
            decision_config.monte_carlo.seed = config
                .monte_carlo
                .seed
                .map(|seed| seed.wrapping_add(k as u64));
            decide(input, &confirmations, bar_index, &decision_config, priors)
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;

    let approved_signals = decisions
        .iter()
        .filter(|d| d.validation.execution_ready && d.recommendation.action.is_directional())
        .count();
    let ledger = replay(&primary.bars, primary.timeframe, &decisions, settings, &config.risk);
    let stats = BacktestStats::from_ledger(
        &ledger,
        settings.initial_capital,
        primary.timeframe.periods_per_year(),
        &config.risk,
    );
    let assessment = StrategyAssessment::evaluate(&stats, settings);
    info!(
        symbol = %primary.symbol,
        trades = stats.total_trades,
        total_return_pct = stats.total_return_pct,
        verdict = ?assessment.verdict,
        "backtest complete"
    );

    Ok(BacktestReport {
        symbol: primary.symbol.clone(),
        timeframe: primary.timeframe,
        confirmation_timeframes: settings.confirmation_timeframes.clone(),
        decisions: decisions.len(),
        approved_signals,
        trades: ledger.trades,
        equity_curve: ledger.equity,
        stats,
        assessment,
        config_fingerprint: fingerprint,
    })
}

fn close_time(bar: &PriceBar, timeframe: Timeframe) -> DateTime<Utc> {
    bar.timestamp + timeframe.duration()
}

/// Primary bar indices closing on a slowest-timeframe boundary with a full
/// lookback window on every timeframe.
fn decision_points(
    primary: &OhlcvSeries,
    confirmations: &[OhlcvSeries],
    lookback: usize,
) -> Vec<usize> {
    let step_secs = confirmations
        .iter()
        .map(|s| s.timeframe.minutes())
        .max()
        .unwrap_or(primary.timeframe.minutes())
        * 60;
    primary
        .bars
        .iter()
        .enumerate()
        .filter(|&(i, bar)| {
            let close = close_time(bar, primary.timeframe);
            i + 1 >= lookback
                && close.timestamp().rem_euclid(step_secs) == 0
                && confirmations
                    .iter()
                    .all(|s| closed_by(s, close) >= lookback)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Number of bars of `series` closed at or before `time`.
fn closed_by(series: &OhlcvSeries, time: DateTime<Utc>) -> usize {
    series
        .bars
        .partition_point(|b| close_time(b, series.timeframe) <= time)
}

fn window(series: &OhlcvSeries, end: usize, lookback: usize) -> OhlcvSeries {
    let start = end.saturating_sub(lookback);
    OhlcvSeries::new(
        series.symbol.clone(),
        series.timeframe,
        series.bars[start..end].to_vec(),
    )
}

fn decide(
    input: &BacktestInput<'_>,
    confirmations: &[OhlcvSeries],
    bar_index: usize,
    config: &AnalysisConfig,
    priors: &PriorAccuracyTable,
) -> Result<Decision, AnalysisError> {
    let primary = input.series;
    let lookback = config.backtest.lookback_bars;
    let now = close_time(&primary.bars[bar_index], primary.timeframe);

    let mut series = Vec::with_capacity(confirmations.len() + 1);
    series.push(window(primary, bar_index + 1, lookback));
    series.extend(
        confirmations
            .iter()
            .map(|s| window(s, closed_by(s, now), lookback)),
    );

    let outcome = analyze(
        &AnalysisInput {
            symbol: &primary.symbol,
            series: &series,
            pattern: input.pattern,
            balance: config.backtest.initial_capital,
        },
        config,
        priors,
        now,
    )?;
    Ok(Decision {
        bar_index,
        recommendation: outcome.recommendation,
        validation: outcome.validation,
        risk_profile: outcome.risk_profile,
    })
}

/// Aggregate `series` into complete `target` buckets aligned to the Unix epoch.
///
/// A bucket is kept only when every constituent bar is present. Weekly
/// buckets therefore start on Thursdays.
pub fn resample(series: &OhlcvSeries, target: Timeframe) -> OhlcvSeries {
    let ratio = (target.minutes() / series.timeframe.minutes()).max(1) as usize;
    let bucket_secs = target.minutes() * 60;
    let mut bars = Vec::with_capacity(series.len() / ratio + 1);
    let mut current: Option<(i64, PriceBar, usize)> = None;

    for bar in &series.bars {
        let key = bar.timestamp.timestamp().div_euclid(bucket_secs);
        match &mut current {
            Some((k, agg, count)) if *k == key => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                *count += 1;
            }
            slot => {
                if let Some((_, agg, count)) = slot.take() {
                    if count == ratio {
                        bars.push(agg);
                    }
                }
                let offset = bar.timestamp.timestamp().rem_euclid(bucket_secs);
                let mut agg = bar.clone();
                agg.timestamp = bar.timestamp - Duration::seconds(offset);
                *slot = Some((key, agg, 1));
            }
        }
    }
    if let Some((_, agg, count)) = current {
        if count == ratio {
            bars.push(agg);
        }
    }

    OhlcvSeries::new(series.symbol.clone(), target, bars)
}

// ─── Position lifecycle ─────────────────────────────────────────────

#[derive(Debug, Clone)]
struct OpenPosition {
    side: Action,
    entry_index: usize,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    quantity: f64,
    entry_fee: f64,
    stop_loss: f64,
    take_profit: f64,
    confidence: f64,
}

impl OpenPosition {
    fn unrealized(&self, price: f64) -> f64 {
        side_sign(self.side) * (price - self.entry_price) * self.quantity - self.entry_fee
    }
}

#[derive(Debug, Default)]
struct Ledger {
    trades: Vec<TradeRecord>,
    equity: Vec<EquityPoint>,
    total_fees: f64,
    bars_replayed: usize,
    bars_in_market: usize,
}

fn side_sign(side: Action) -> f64 {
    match side {
        Action::Short => -1.0,
        _ => 1.0,
    }
}

/// Entry fill: buys pay up, sells receive less.
fn entry_fill(price: f64, side: Action, slippage: f64) -> f64 {
    price * (1.0 + side_sign(side) * slippage)
}

fn exit_fill(price: f64, side: Action, slippage: f64) -> f64 {
    price * (1.0 - side_sign(side) * slippage)
}

/// Stop or target touched by `bar`, stop first. A gap through a level fills
/// at the open.
fn level_exit(bar: &PriceBar, position: &OpenPosition) -> Option<(f64, ExitReason)> {
    let (stop, target) = (position.stop_loss, position.take_profit);
    match position.side {
        Action::Long if bar.low <= stop => Some((bar.open.min(stop), ExitReason::StopLoss)),
        Action::Long if bar.high >= target => {
            Some((bar.open.max(target), ExitReason::TakeProfit))
        }
        Action::Short if bar.high >= stop => Some((bar.open.max(stop), ExitReason::StopLoss)),
        Action::Short if bar.low <= target => {
            Some((bar.open.min(target), ExitReason::TakeProfit))
        }
        _ => None,
    }
}

fn open_position(
    decision: &Decision,
    bar: &PriceBar,
    timeframe: Timeframe,
    balance: f64,
    sizer: &PositionSizer,
    config: &BacktestConfig,
) -> Option<OpenPosition> {
    let recommendation = &decision.recommendation;
    if !(decision.validation.execution_ready && recommendation.action.is_directional()) {
        return None;
    }
    let levels = recommendation.levels?;
    let quantity = sizer
        .size(
            recommendation,
            &decision.validation,
            decision.risk_profile.as_ref(),
            balance,
        )
        .capped_size()
        .filter(|q| q.is_finite() && *q > 0.0)?;
    let entry_price = entry_fill(levels.entry, recommendation.action, config.slippage);
    Some(OpenPosition {
        side: recommendation.action,
        entry_index: decision.bar_index,
        entry_time: close_time(bar, timeframe),
        entry_price,
        quantity,
        entry_fee: entry_price * quantity * config.trading_fee,
        stop_loss: levels.stop_loss,
        take_profit: levels.take_profit,
        confidence: recommendation.confidence,
    })
}

fn close_position(
    position: &OpenPosition,
    bar_index: usize,
    exit_time: DateTime<Utc>,
    price: f64,
    reason: ExitReason,
    config: &BacktestConfig,
) -> TradeRecord {
    let exit_price = exit_fill(price, position.side, config.slippage);
    let exit_fee = exit_price * position.quantity * config.trading_fee;
    let pnl = position.unrealized(exit_price) - exit_fee;
    TradeRecord {
        side: position.side,
        entry_time: position.entry_time,
        exit_time,
        entry_price: position.entry_price,
        exit_price,
        quantity: position.quantity,
        fees: position.entry_fee + exit_fee,
        pnl,
        return_pct: pnl / (position.entry_price * position.quantity) * 100.0,
        bars_held: bar_index - position.entry_index,
        exit_reason: reason,
        confidence: position.confidence,
    }
}

/// Play decisions forward over `bars`. Decisions must be sorted by bar index.
fn replay(
    bars: &[PriceBar],
    timeframe: Timeframe,
    decisions: &[Decision],
    config: &BacktestConfig,
    risk: &RiskConfig,
) -> Ledger {
    let mut ledger = Ledger::default();
    let Some(start) = decisions.first().map(|d| d.bar_index) else {
        return ledger;
    };
    let sizer = PositionSizer::new(risk.clone());
    let mut cash = config.initial_capital;
    let mut open: Option<OpenPosition> = None;
    let mut pending = decisions.iter().peekable();

    ledger.equity.push(EquityPoint {
        time: bars[start].timestamp,
        equity: cash,
    });
    for (i, bar) in bars.iter().enumerate().skip(start) {
        let closes_at = close_time(bar, timeframe);

        if let Some(position) = open.as_ref().filter(|p| i > p.entry_index) {
            let held = i - position.entry_index;
            let exit = level_exit(bar, position)
                .or_else(|| {
                    (held >= config.max_holding_bars).then_some((bar.close, ExitReason::Timeout))
                })
                .or_else(|| {
                    (i + 1 == bars.len()).then_some((bar.close, ExitReason::EndOfData))
                });
            if let Some((price, reason)) = exit {
                let trade = close_position(position, i, closes_at, price, reason, config);
                debug!(
                    side = %trade.side,
                    pnl = trade.pnl,
                    reason = ?trade.exit_reason,
                    "position closed"
                );
                cash += trade.pnl;
                ledger.total_fees += trade.fees;
                ledger.trades.push(trade);
                open = None;
            }
        }

        while let Some(decision) = pending.next_if(|d| d.bar_index <= i) {
            if decision.bar_index < i || open.is_some() || i + 1 == bars.len() {
                continue;
            }
            open = open_position(decision, bar, timeframe, cash, &sizer, config);
            if let Some(position) = &open {
                debug!(
                    side = %position.side,
                    entry = position.entry_price,
                    quantity = position.quantity,
                    "position opened"
                );
            }
        }

        let equity = cash + open.as_ref().map_or(0.0, |p| p.unrealized(bar.close));
        ledger.equity.push(EquityPoint {
            time: closes_at,
            equity,
        });
        ledger.bars_replayed += 1;
        ledger.bars_in_market += usize::from(open.is_some());
    }
    ledger
}

// ─── Statistics ─────────────────────────────────────────────────────

fn longest_run(trades: &[TradeRecord], predicate: impl Fn(&TradeRecord) -> bool) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for trade in trades {
        if predicate(trade) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn mean_of(values: Vec<f64>) -> Option<f64> {
    (!values.is_empty()).then(|| mean_f64(&values))
}

impl BacktestStats {
    fn from_ledger(
        ledger: &Ledger,
        initial_capital: f64,
        periods_per_year: f64,
        risk: &RiskConfig,
    ) -> Self {
        let final_equity = ledger.equity.last().map_or(initial_capital, |p| p.equity);
        let returns: Vec<f64> = ledger
            .equity
            .windows(2)
            .filter(|w| w[0].equity > 0.0)
            .map(|w| w[1].equity / w[0].equity - 1.0)
            .collect();
        let trades = &ledger.trades;
        let is_win = |t: &TradeRecord| t.pnl > 0.0;
        let winning_trades = trades.iter().filter(|t| is_win(t)).count();
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();

        Self {
            initial_capital,
            final_equity,
            total_return_pct: (final_equity / initial_capital - 1.0) * 100.0,
            max_drawdown_pct: max_drawdown(&returns).map_or(0.0, |dd| -dd * 100.0),
            sharpe: sharpe_ratio(&returns, risk.risk_free_rate, periods_per_year),
            sortino: sortino_ratio(&returns, risk.risk_free_rate, periods_per_year),
            total_trades: trades.len(),
            winning_trades,
            losing_trades: trades.len() - winning_trades,
            win_rate_pct: (!trades.is_empty())
                .then(|| winning_trades as f64 / trades.len() as f64 * 100.0),
            avg_win_pct: mean_of(
                trades.iter().filter(|t| is_win(t)).map(|t| t.return_pct).collect(),
            ),
            avg_loss_pct: mean_of(
                trades.iter().filter(|t| !is_win(t)).map(|t| t.return_pct).collect(),
            ),
            profit_factor: profit_factor(&pnls),
            max_consecutive_wins: longest_run(trades, is_win),
            max_consecutive_losses: longest_run(trades, |t| !is_win(t)),
            exposure_pct: if ledger.bars_replayed == 0 {
                0.0
            } else {
                ledger.bars_in_market as f64 / ledger.bars_replayed as f64 * 100.0
            },
            total_fees: ledger.total_fees,
            tail: compute_tail_metrics(&returns, risk.var_confidence),
        }
    }
}

// ─── Market scenarios ───────────────────────────────────────────────

/// A named history to replay.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub series: OhlcvSeries,
}

/// Bull, bear, sideways and a bull-then-bear mix, all ending at `end`.
pub fn standard_scenarios(
    symbol: &str,
    timeframe: Timeframe,
    end: DateTime<Utc>,
    bars: usize,
    seed: u64,
) -> Vec<Scenario> {
    let synthetic = |up_fraction: f64, seed: u64| {
        SyntheticSeries::new(symbol, timeframe, end)
            .bars(bars)
            .up_fraction(up_fraction)
            .seed(seed)
            .generate()
    };

    let first_half = bars / 2;
    let midpoint = end - timeframe.duration() * (bars - first_half) as i32;
    let rally = SyntheticSeries::new(symbol, timeframe, midpoint)
        .bars(first_half)
        .up_fraction(0.6)
        .seed(seed.wrapping_add(3))
        .generate();
    let selloff = SyntheticSeries::new(symbol, timeframe, end)
        .bars(bars - first_half)
        .start_price(rally.last_close().unwrap_or(100.0))
        .up_fraction(0.4)
        .seed(seed.wrapping_add(4))
        .generate();
    let mut mixed = rally;
    mixed.bars.extend(selloff.bars);

    vec![
        Scenario {
            name: "bull".into(),
            series: synthetic(0.6, seed),
        },
        Scenario {
            name: "bear".into(),
            series: synthetic(0.4, seed.wrapping_add(1)),
        },
        Scenario {
            name: "sideways".into(),
            series: synthetic(0.5, seed.wrapping_add(2)),
        },
        Scenario {
            name: "mixed".into(),
            series: mixed,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Robustness {
    Robust,
    ConditionallyRobust,
    NotRobust,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub report: BacktestReport,
}

/// Cross-scenario averages and the robustness verdict.
///
/// ROBUST: no scenario lost more than the loss floor, the average return is
/// positive and the average Sharpe clears `robust_min_sharpe`. CONDITIONALLY
/// ROBUST: positive average return only.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub scenarios: Vec<ScenarioReport>,
    pub avg_return_pct: f64,
    /// Mean over scenarios with a defined Sharpe.
    pub avg_sharpe: Option<f64>,
    pub avg_win_rate_pct: Option<f64>,
    pub total_trades: usize,
    pub above_loss_floor: bool,
    pub profitable: bool,
    pub robustness: Robustness,
}

/// Replay every scenario in parallel and summarize.
pub fn run_scenarios(
    scenarios: &[Scenario],
    pattern: PatternBias,
    config: &AnalysisConfig,
    priors: &PriorAccuracyTable,
) -> Result<ScenarioSummary, BacktestError> {
    if scenarios.is_empty() {
        return Err(BacktestError::NoScenarios);
    }
    let scenarios = scenarios
        .par_iter()
        .map(|scenario| {
            let report = backtest(
                &BacktestInput {
                    series: &scenario.series,
                    pattern,
                },
                config,
                priors,
            )?;
            Ok(ScenarioReport {
                name: scenario.name.clone(),
                report,
            })
        })
        .collect::<Result<Vec<_>, BacktestError>>()?;
    Ok(summarize(scenarios, &config.backtest))
}

fn summarize(scenarios: Vec<ScenarioReport>, config: &BacktestConfig) -> ScenarioSummary {
    let stats = || scenarios.iter().map(|s| &s.report.stats);
    let returns: Vec<f64> = stats().map(|s| s.total_return_pct).collect();
    let avg_return_pct = mean_f64(&returns);
    let avg_sharpe = mean_of(stats().filter_map(|s| s.sharpe).collect());
    let avg_win_rate_pct = mean_of(stats().filter_map(|s| s.win_rate_pct).collect());
    let total_trades: usize = stats().map(|s| s.total_trades).sum();

    let above_loss_floor = returns.iter().all(|&r| r > config.robust_loss_floor_pct);
    let profitable = avg_return_pct > 0.0;
    let robustness = if above_loss_floor
        && profitable
        && avg_sharpe.is_some_and(|s| s > config.robust_min_sharpe)
    {
        Robustness::Robust
    } else if profitable {
        Robustness::ConditionallyRobust
    } else {
        Robustness::NotRobust
    };
    info!(
        scenarios = scenarios.len(),
        avg_return_pct,
        total_trades,
        robustness = ?robustness,
        "scenario validation complete"
    );

    ScenarioSummary {
        scenarios,
        avg_return_pct,
        avg_sharpe,
        avg_win_rate_pct,
        total_trades,
        above_loss_floor,
        profitable,
        robustness,
    }
}
