use futures::future::join_all;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::warn;

use crate::exchange::Exchange;
use crate::indicators::{rsi, RsiZone, DEFAULT_RSI_PERIOD};
use crate::types::{closes, Candle, Signal, Ticker, TimeFrame, TradingPair};

/// A BUY needs the day's drop to be shallower than this (in %).
const MAX_DROP_FOR_BUY: Decimal = dec!(-2);
/// A SELL needs the day's rise to stay below this (in %).
const MAX_RISE_FOR_SELL: Decimal = dec!(2);

/// Combines the RSI zone with the 24h move: oversold without a sharp drop
/// reads as BUY, overbought without a sharp rise reads as SELL.
pub fn derive_signal(rsi_value: Decimal, change_24h_pct: Decimal) -> Signal {
    match RsiZone::of(rsi_value) {
        RsiZone::Oversold if change_24h_pct > MAX_DROP_FOR_BUY => Signal::Buy,
        RsiZone::Overbought if change_24h_pct < MAX_RISE_FOR_SELL => Signal::Sell,
        _ => Signal::Hold,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: TradingPair,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "change24h", with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub volume: Decimal,
    pub signal: Signal,
    pub rsi: i64,
    pub confidence: f64,
}

/// Builds the dashboard row for one pair.
///
/// Confidence is a display value drawn from [0.6, 0.9); nothing downstream acts on it.
pub fn build_snapshot<R: Rng + ?Sized>(ticker: &Ticker, candles: &[Candle], rng: &mut R) -> MarketSnapshot {
    let rsi_value = rsi(&closes(candles), DEFAULT_RSI_PERIOD);
    let change = ticker.price_change_pct_24h;

    MarketSnapshot {
        symbol: ticker.pair,
        price: ticker.price,
        change_24h: change,
        volume: ticker.volume_24h,
        signal: derive_signal(rsi_value, change),
        rsi: rsi_value
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(50),
        confidence: rng.gen_range(0.6..0.9),
    }
}

async fn fetch_pair_inputs<E: Exchange + ?Sized>(
    exchange: &E,
    pair: TradingPair,
) -> anyhow::Result<(Ticker, Vec<Candle>)> {
    let ticker = exchange.get_ticker(pair).await?;
    let candles = exchange
        .get_candles(pair, TimeFrame::H1, DEFAULT_RSI_PERIOD as u32 + 1)
        .await?;
    Ok((ticker, candles))
}

/// Market rows for every tracked pair. Pairs that fail to load are logged and skipped.
pub async fn fetch_market_data<E: Exchange + ?Sized>(exchange: &E) -> Vec<MarketSnapshot> {
    let pairs = TradingPair::tracked();
    let results = join_all(pairs.iter().map(|pair| fetch_pair_inputs(exchange, *pair))).await;

    let mut rng = rand::thread_rng();
    pairs
        .iter()
        .zip(results)
        .filter_map(|(pair, result)| match result {
            Ok((ticker, candles)) => Some(build_snapshot(&ticker, &candles, &mut rng)),
            Err(e) => {
                warn!("Failed to load market data for {}: {}", pair, e);
                None
            }
        })
        .collect()
}
