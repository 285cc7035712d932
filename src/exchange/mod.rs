pub mod binance;

pub use binance::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{AccountInfo, Candle, Fill, Ticker, TimeFrame, TradingPair};

/// Read-only view of a spot exchange account and its market data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_ticker(&self, pair: TradingPair) -> anyhow::Result<Ticker>;
    async fn get_candles(&self, pair: TradingPair, timeframe: TimeFrame, limit: u32) -> anyhow::Result<Vec<Candle>>;
    async fn get_historical_candles(
        &self,
        pair: TradingPair,
        timeframe: TimeFrame,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>>;
    /// Last traded price for an arbitrary symbol such as `DOGEUSDT`.
    async fn get_price(&self, symbol: &str) -> anyhow::Result<Decimal>;
    async fn get_account(&self) -> anyhow::Result<AccountInfo>;
    async fn get_my_trades(&self, pair: TradingPair, limit: u32) -> anyhow::Result<Vec<Fill>>;
}
