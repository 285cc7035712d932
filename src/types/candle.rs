use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{TimeFrame, TradingPair};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub pair: TradingPair,
    pub timeframe: TimeFrame,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

pub fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

/// 24h rolling statistics for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: TradingPair,
    pub price: Decimal,
    pub volume_24h: Decimal,
    pub price_change_pct_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}
