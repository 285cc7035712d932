pub mod portfolio;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::exchange::Exchange;
use crate::types::{Fill, Side, TradingPair, QUOTE_ASSET};

/// Fills requested per symbol when building the trade history.
pub const TRADES_PER_SYMBOL: u32 = 100;

/// Buy and sell quote volume accumulated for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolBucket {
    pub fills: u64,
    pub buy_total: Decimal,
    pub sell_total: Decimal,
    /// Sells after which the running sell total exceeded the running buy total.
    pub winning_sells: u64,
}

impl SymbolBucket {
    pub fn pnl(&self) -> Decimal {
        self.sell_total - self.buy_total
    }

    /// A bucket counts as a win when more quote came back from sells than went into buys.
    pub fn is_win(&self) -> bool {
        self.sell_total > self.buy_total
    }
}

/// Approximate performance derived from raw fills.
///
/// This is not position accounting: open inventory is treated as a loss
/// of its purchase cost. `win_rate` is the share of all fills that were
/// winning sells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistoryStats {
    #[serde(rename = "totalPnL", with = "rust_decimal::serde::float")]
    pub total_pnl: Decimal,
    pub total_trades: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub win_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_commission: Decimal,
    pub winning_symbols: u64,
    pub losing_symbols: u64,
}

/// Groups fills per symbol, walking them in the order given (newest first
/// for the trade history).
pub fn bucket_by_symbol(fills: &[Fill]) -> BTreeMap<String, SymbolBucket> {
    let mut buckets: BTreeMap<String, SymbolBucket> = BTreeMap::new();
    for fill in fills {
        let bucket = buckets.entry(fill.symbol.clone()).or_default();
        bucket.fills += 1;
        match fill.side() {
            Side::Buy => bucket.buy_total += fill.quote_qty,
            Side::Sell => {
                bucket.sell_total += fill.quote_qty;
                if bucket.sell_total > bucket.buy_total {
                    bucket.winning_sells += 1;
                }
            }
        }
    }
    buckets
}

pub fn aggregate_fills(fills: &[Fill]) -> TradeHistoryStats {
    let total_commission: Decimal = fills
        .iter()
        .filter(|f| f.commission_asset == QUOTE_ASSET)
        .map(|f| f.commission)
        .sum();

    let buckets = bucket_by_symbol(fills);
    let total_pnl: Decimal = buckets.values().map(SymbolBucket::pnl).sum();
    let winning_symbols = buckets.values().filter(|b| b.is_win()).count() as u64;
    let losing_symbols = buckets.len() as u64 - winning_symbols;

    let winning_sells: u64 = buckets.values().map(|b| b.winning_sells).sum();
    let total_trades = fills.len() as u64;

    let win_rate = if total_trades == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(winning_sells) / Decimal::from(total_trades) * Decimal::ONE_HUNDRED
    };

    TradeHistoryStats {
        total_pnl,
        total_trades,
        win_rate,
        total_commission,
        winning_symbols,
        losing_symbols,
    }
}

/// A fill as the trade history table renders it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub quote_qty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission: Decimal,
    pub commission_asset: String,
    pub time: i64,
    pub is_buyer: bool,
    pub is_maker: bool,
    pub is_best_match: bool,
}

impl From<&Fill> for TradeRecord {
    fn from(fill: &Fill) -> Self {
        Self {
            id: fill.id.to_string(),
            symbol: fill.symbol.clone(),
            side: fill.side(),
            quantity: fill.qty,
            price: fill.price,
            quote_qty: fill.quote_qty,
            commission: fill.commission,
            commission_asset: fill.commission_asset.clone(),
            time: fill.time.timestamp_millis(),
            is_buyer: fill.is_buyer,
            is_maker: fill.is_maker,
            is_best_match: fill.is_best_match,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeHistory {
    pub trades: Vec<TradeRecord>,
    pub stats: TradeHistoryStats,
}

/// Collects recent fills for every tracked pair, newest first.
///
/// A pair whose request fails is logged and left out.
pub async fn fetch_trade_history<E: Exchange + ?Sized>(exchange: &E) -> TradeHistory {
    let pairs = TradingPair::tracked();
    let results = join_all(
        pairs
            .iter()
            .map(|pair| exchange.get_my_trades(*pair, TRADES_PER_SYMBOL)),
    )
    .await;

    let mut fills = Vec::new();
    for (pair, result) in pairs.iter().zip(results) {
        match result {
            Ok(batch) => fills.extend(batch),
            Err(e) => warn!("Failed to fetch trades for {}: {}", pair, e),
        }
    }

    fills.sort_by(|a, b| b.time.cmp(&a.time));

    TradeHistory {
        stats: aggregate_fills(&fills),
        trades: fills.iter().map(TradeRecord::from).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exchange::MockExchange;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    pub(crate) fn fill(id: u64, symbol: &str, is_buyer: bool, quote_qty: Decimal, commission_asset: &str) -> Fill {
        Fill {
            id,
            symbol: symbol.to_string(),
            price: dec!(100),
            qty: quote_qty / dec!(100),
            quote_qty,
            commission: dec!(0.1),
            commission_asset: commission_asset.to_string(),
            time: Utc.timestamp_millis_opt(1_700_000_000_000 + id as i64 * 1000).unwrap(),
            is_buyer,
            is_maker: false,
            is_best_match: true,
        }
    }

    #[test]
    fn test_only_usdt_commission_counted() {
        let fills = vec![
            fill(1, "BTCUSDT", true, dec!(100), "USDT"),
            fill(2, "BTCUSDT", false, dec!(120), "BNB"),
            fill(3, "ETHUSDT", true, dec!(50), "ETH"),
            fill(4, "ETHUSDT", false, dec!(40), "USDT"),
        ];

        let stats = aggregate_fills(&fills);
        assert_eq!(stats.total_commission, dec!(0.2));
        assert_eq!(stats.total_trades, 4);
    }

    #[test]
    fn test_bucket_wins_only_when_sells_exceed_buys() {
        let fills = vec![
            fill(1, "BTCUSDT", true, dec!(100), "USDT"),
            fill(2, "BTCUSDT", false, dec!(120), "USDT"),
            fill(3, "ETHUSDT", true, dec!(50), "USDT"),
            fill(4, "ETHUSDT", false, dec!(50), "USDT"),
            fill(5, "SOLUSDT", true, dec!(30), "USDT"),
        ];

        let buckets = bucket_by_symbol(&fills);
        assert!(buckets["BTCUSDT"].is_win());
        assert!(!buckets["ETHUSDT"].is_win());
        assert!(!buckets["SOLUSDT"].is_win());

        let stats = aggregate_fills(&fills);
        assert_eq!(stats.winning_symbols, 1);
        assert_eq!(stats.losing_symbols, 2);
        assert_eq!(stats.total_pnl, dec!(-10));
        // one winning sell out of five fills
        assert_eq!(stats.win_rate, dec!(20));
    }

    #[test]
    fn test_win_rate_counts_sells_in_newest_first_order() {
        // the sell is newer, so it is walked before the buy it closes
        let fills = vec![
            fill(2, "BTCUSDT", false, dec!(120), "USDT"),
            fill(1, "BTCUSDT", true, dec!(100), "USDT"),
        ];
        let stats = aggregate_fills(&fills);
        assert_eq!(stats.win_rate, dec!(50));
        assert_eq!(stats.total_pnl, dec!(20));

        // each sell is judged on the running totals at that point
        let fills = vec![
            fill(4, "ETHUSDT", false, dec!(10), "USDT"),
            fill(3, "ETHUSDT", true, dec!(100), "USDT"),
            fill(2, "ETHUSDT", false, dec!(50), "USDT"),
            fill(1, "ETHUSDT", false, dec!(60), "USDT"),
        ];
        let buckets = bucket_by_symbol(&fills);
        assert_eq!(buckets["ETHUSDT"].winning_sells, 2);
        assert_eq!(aggregate_fills(&fills).win_rate, dec!(50));
    }

    #[test]
    fn test_empty_history() {
        let stats = aggregate_fills(&[]);
        assert_eq!(stats, TradeHistoryStats::default());
    }

    #[test]
    fn test_stats_wire_names() {
        let stats = aggregate_fills(&[fill(1, "BTCUSDT", false, dec!(10), "USDT")]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalPnL"], serde_json::json!(10.0));
        assert_eq!(json["winRate"], serde_json::json!(100.0));
        assert!(json.get("totalCommission").is_some());
    }

    #[tokio::test]
    async fn test_fetch_skips_failing_pairs_and_sorts_newest_first() {
        let mut exchange = MockExchange::new();
        exchange.expect_get_my_trades().returning(|pair, _| match pair {
            TradingPair::BTCUSDT => Ok(vec![
                fill(1, "BTCUSDT", true, dec!(100), "USDT"),
                fill(5, "BTCUSDT", false, dec!(110), "USDT"),
            ]),
            TradingPair::ETHUSDT => Ok(vec![fill(3, "ETHUSDT", true, dec!(20), "USDT")]),
            _ => Err(anyhow::anyhow!("Invalid symbol")),
        });

        let history = fetch_trade_history(&exchange).await;
        let ids: Vec<&str> = history.trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "3", "1"]);
        assert_eq!(history.stats.total_trades, 3);
        assert_eq!(history.stats.winning_symbols, 1);
        // newest BTC fill is the sell, which wins against an empty buy total
        assert_eq!(history.stats.win_rate.round_dp(2), dec!(33.33));
    }
}
