use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::exchange::Exchange;
use crate::indicators::{rsi, RsiZone, DEFAULT_RSI_PERIOD};
use crate::types::{Candle, TimeFrame, TradingPair};

/// Taker fee charged on each side of a trade.
pub const FEE_RATE: Decimal = dec!(0.001);

/// Sentinel accepted in place of a symbol to run every backtestable pair.
pub const ALL_SYMBOLS: &str = "ALL";

/// Largest starting balance accepted. Keeps equity and benchmark math well
/// inside `Decimal` range for any realistic price.
pub const MAX_INITIAL_CAPITAL: Decimal = dec!(1000000000000);

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("End date must not be before start date")]
    InvalidRange,

    #[error("Initial capital must be positive")]
    InvalidCapital,

    #[error("Initial capital must not exceed {}", MAX_INITIAL_CAPITAL)]
    CapitalTooLarge,

    #[error("Unsupported symbol: {0}")]
    UnknownSymbol(String),

    #[error("No price data for {0} in the requested range")]
    NoData(TradingPair),

    #[error("Exchange error: {0}")]
    Exchange(#[from] anyhow::Error),
}

impl BacktestError {
    /// Whether the request itself was at fault.
    pub fn is_invalid_request(&self) -> bool {
        !matches!(self, Self::Exchange(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_capital: Decimal,
}

impl BacktestRequest {
    pub fn validate(&self) -> Result<Vec<TradingPair>, BacktestError> {
        if self.end_date < self.start_date {
            return Err(BacktestError::InvalidRange);
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::InvalidCapital);
        }
        if self.initial_capital > MAX_INITIAL_CAPITAL {
            return Err(BacktestError::CapitalTooLarge);
        }
        resolve_symbols(&self.symbol)
    }
}

pub fn resolve_symbols(symbol: &str) -> Result<Vec<TradingPair>, BacktestError> {
    if symbol.eq_ignore_ascii_case(ALL_SYMBOLS) {
        return Ok(TradingPair::backtestable());
    }

    TradingPair::from_str(&symbol.to_uppercase())
        .filter(|pair| TradingPair::backtestable().contains(pair))
        .map(|pair| vec![pair])
        .ok_or_else(|| BacktestError::UnknownSymbol(symbol.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub portfolio: Decimal,
    pub benchmark: Decimal,
}

/// Profit of one completed buy/sell cycle, fees included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationRun {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<RoundTrip>,
}

struct OpenPosition {
    quantity: Decimal,
    cost: Decimal,
    entry_price: Decimal,
}

/// Replays daily closes through the RSI rule.
///
/// All cash goes in when flat and RSI drops below 30; the whole position
/// comes out when RSI rises above 70. Each day is valued at its close, so
/// a position still open on the last day is simply marked to market.
pub fn simulate(candles: &[Candle], capital: Decimal) -> SimulationRun {
    let Some(first_close) = candles.first().map(|c| c.close).filter(|c| !c.is_zero()) else {
        return SimulationRun::default();
    };

    let mut cash = capital;
    let mut position: Option<OpenPosition> = None;
    let mut closes = Vec::with_capacity(candles.len());
    let mut run = SimulationRun::default();

    for candle in candles {
        let price = candle.close;
        closes.push(price);
        let zone = RsiZone::of(rsi(&closes, DEFAULT_RSI_PERIOD));

        match position.take() {
            None if zone == RsiZone::Oversold && price > Decimal::ZERO => {
                let quantity = cash * (Decimal::ONE - FEE_RATE) / price;
                debug!("{} buy {} @ {}", candle.open_time.date_naive(), quantity, price);
                position = Some(OpenPosition {
                    quantity,
                    cost: cash,
                    entry_price: price,
                });
                cash = Decimal::ZERO;
            }
            Some(open) if zone == RsiZone::Overbought => {
                let proceeds = open.quantity * price * (Decimal::ONE - FEE_RATE);
                debug!("{} sell {} @ {}", candle.open_time.date_naive(), open.quantity, price);
                run.trades.push(RoundTrip {
                    entry_price: open.entry_price,
                    exit_price: price,
                    pnl: proceeds - open.cost,
                });
                cash = proceeds;
            }
            unchanged => position = unchanged,
        }

        let holdings = position.as_ref().map(|p| p.quantity * price).unwrap_or_default();
        run.equity_curve.push(EquityPoint {
            date: candle.open_time.date_naive(),
            portfolio: cash + holdings,
            benchmark: capital * price / first_close,
        });
    }

    run
}

/// Adds curves together date by date. A date missing from one curve
/// contributes nothing for that curve.
pub fn merge_curves(curves: &[Vec<EquityPoint>]) -> Vec<EquityPoint> {
    let mut by_date: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
    for point in curves.iter().flatten() {
        let entry = by_date.entry(point.date).or_default();
        entry.0 += point.portfolio;
        entry.1 += point.benchmark;
    }

    by_date
        .into_iter()
        .map(|(date, (portfolio, benchmark))| EquityPoint {
            date,
            portfolio,
            benchmark,
        })
        .collect()
}

/// Largest peak-to-trough fall, as a negative percentage.
pub fn max_drawdown(values: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    for value in values {
        if *value > peak {
            peak = *value;
        }
        if peak > Decimal::ZERO {
            let drawdown = (*value - peak) / peak * Decimal::ONE_HUNDRED;
            worst = worst.min(drawdown);
        }
    }
    worst
}

/// Annualized Sharpe ratio of daily returns with a zero risk-free rate.
pub fn sharpe_ratio(values: &[Decimal]) -> Decimal {
    let series: Vec<f64> = values.iter().filter_map(|v| v.to_f64()).collect();
    let returns: Vec<f64> = series
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        Decimal::from_f64(mean / std_dev * DAYS_PER_YEAR.sqrt()).unwrap_or_default()
    } else {
        Decimal::ZERO
    }
}

/// Gross profit over gross loss. Capped at 100 when nothing was lost.
pub fn profit_factor(trades: &[RoundTrip]) -> Decimal {
    let gross_profit: Decimal = trades.iter().map(|t| t.pnl).filter(|p| *p > Decimal::ZERO).sum();
    let gross_loss: Decimal = trades
        .iter()
        .map(|t| t.pnl)
        .filter(|p| *p < Decimal::ZERO)
        .map(|p| p.abs())
        .sum();

    if !gross_loss.is_zero() {
        gross_profit / gross_loss
    } else if gross_profit > Decimal::ZERO {
        dec!(100)
    } else {
        Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub portfolio: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub benchmark: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_capital: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_return: Decimal,
    pub total_trades: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub win_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_drawdown: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub sharpe_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit_factor: Decimal,
    pub chart_data: Vec<ChartPoint>,
}

pub fn summarize(
    symbol: &str,
    initial_capital: Decimal,
    equity_curve: &[EquityPoint],
    trades: &[RoundTrip],
) -> BacktestResult {
    let values: Vec<Decimal> = equity_curve.iter().map(|p| p.portfolio).collect();
    let final_value = values.last().copied().unwrap_or(initial_capital);

    let total_trades = trades.len() as u64;
    let wins = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count() as u64;
    let win_rate = if total_trades > 0 {
        Decimal::from(wins) / Decimal::from(total_trades) * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    BacktestResult {
        symbol: symbol.to_string(),
        initial_capital,
        final_value: final_value.round_dp(2),
        total_return: ((final_value - initial_capital) / initial_capital * Decimal::ONE_HUNDRED).round_dp(2),
        total_trades,
        win_rate: win_rate.round_dp(2),
        max_drawdown: max_drawdown(&values).round_dp(2),
        sharpe_ratio: sharpe_ratio(&values).round_dp(2),
        profit_factor: profit_factor(trades).round_dp(2),
        chart_data: equity_curve
            .iter()
            .map(|p| ChartPoint {
                date: p.date.format("%Y-%m-%d").to_string(),
                portfolio: p.portfolio.round_dp(2),
                benchmark: p.benchmark.round_dp(2),
            })
            .collect(),
    }
}

async fn load_daily_candles<E: Exchange + ?Sized>(
    exchange: &E,
    pair: TradingPair,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Candle>, BacktestError> {
    let start_time = start.and_time(NaiveTime::MIN).and_utc();
    let end_time = end
        .and_hms_opt(23, 59, 59)
        .map(|t| t.and_utc())
        .unwrap_or(start_time);

    let candles = exchange
        .get_historical_candles(pair, TimeFrame::D1, start_time, end_time)
        .await?;
    if candles.is_empty() {
        return Err(BacktestError::NoData(pair));
    }
    Ok(candles)
}

/// Runs the RSI backtest for one pair, or for all pairs with the capital split evenly.
pub async fn run_backtest<E: Exchange + ?Sized>(
    exchange: &E,
    request: &BacktestRequest,
) -> Result<BacktestResult, BacktestError> {
    let pairs = request.validate()?;
    info!(
        "Backtesting {} from {} to {} with {} capital",
        request.symbol, request.start_date, request.end_date, request.initial_capital
    );

    let per_pair_capital = request.initial_capital / Decimal::from(pairs.len() as u64);

    let loaded = join_all(
        pairs
            .iter()
            .map(|pair| load_daily_candles(exchange, *pair, request.start_date, request.end_date)),
    )
    .await;

    let mut curves = Vec::with_capacity(pairs.len());
    let mut trades = Vec::new();
    for candles in loaded {
        let run = simulate(&candles?, per_pair_capital);
        curves.push(run.equity_curve);
        trades.extend(run.trades);
    }

    let equity_curve = merge_curves(&curves);
    let result = summarize(&request.symbol.to_uppercase(), request.initial_capital, &equity_curve, &trades);

    info!(
        "Backtest finished: return={}%, trades={}, max_drawdown={}%",
        result.total_return, result.total_trades, result.max_drawdown
    );
    Ok(result)
}
