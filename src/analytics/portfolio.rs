use chrono::{Local, TimeZone};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::exchange::Exchange;
use crate::types::{usdt_symbol, AccountInfo, Balance, Candle, TimeFrame, TradingPair, QUOTE_ASSET};

/// Notional value the simulated portfolio curve starts from.
pub const BASE_PORTFOLIO_VALUE: Decimal = dec!(10000);

/// Hourly candles shown on the portfolio chart.
pub const HISTORY_HOURS: u32 = 24;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub total_wallet_balance: String,
    pub available_balance: String,
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub can_deposit: bool,
    pub balances: Vec<Balance>,
}

/// Values every non-empty balance in USDT.
///
/// `prices` maps `<ASSET>USDT` symbols to their last price; assets without
/// a price are left out of the totals.
pub fn summarize_account(account: &AccountInfo, prices: &HashMap<String, Decimal>) -> AccountSummary {
    let mut total = Decimal::ZERO;
    let mut available = Decimal::ZERO;

    for balance in account.balances.iter().filter(|b| !b.is_empty()) {
        if balance.asset == QUOTE_ASSET {
            total += balance.total();
            available += balance.free;
            continue;
        }

        match prices.get(&usdt_symbol(&balance.asset)) {
            Some(price) => {
                total += balance.total() * price;
                available += balance.free * price;
            }
            None => debug!("Could not value {} in {}", balance.asset, QUOTE_ASSET),
        }
    }

    AccountSummary {
        total_wallet_balance: format!("{:.2}", total),
        available_balance: format!("{:.2}", available),
        can_trade: account.can_trade,
        can_withdraw: account.can_withdraw,
        can_deposit: account.can_deposit,
        balances: account.non_zero_balances(),
    }
}

/// Looks up `<ASSET>USDT` prices for the given assets, skipping any that fail.
pub async fn fetch_usdt_prices<E: Exchange + ?Sized>(
    exchange: &E,
    assets: &[String],
) -> HashMap<String, Decimal> {
    let symbols: Vec<String> = assets
        .iter()
        .filter(|a| a.as_str() != QUOTE_ASSET)
        .map(|a| usdt_symbol(a))
        .collect();

    let results = futures::future::join_all(symbols.iter().map(|s| exchange.get_price(s))).await;

    let mut prices = HashMap::new();
    for (symbol, result) in symbols.into_iter().zip(results) {
        match result {
            Ok(price) => {
                prices.insert(symbol, price);
            }
            Err(e) => warn!("No {} price available: {}", symbol, e),
        }
    }
    prices
}

pub async fn fetch_account_summary<E: Exchange + ?Sized>(exchange: &E) -> anyhow::Result<AccountSummary> {
    let account = exchange.get_account().await?;
    let assets: Vec<String> = account
        .non_zero_balances()
        .into_iter()
        .map(|b| b.asset)
        .collect();
    let prices = fetch_usdt_prices(exchange, &assets).await;
    Ok(summarize_account(&account, &prices))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEstimate {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pnl_percent: Decimal,
}

/// Balances that can be shown as open spot positions.
pub fn position_assets(account: &AccountInfo) -> Vec<Balance> {
    account
        .balances
        .iter()
        .filter(|b| b.free > Decimal::ZERO && b.asset != QUOTE_ASSET)
        .cloned()
        .collect()
}

/// Builds a position with an entry price drawn within ±5% of the current price.
///
/// The account endpoint carries no cost basis, so the entry is a placeholder.
/// Returns `None` when the price is not positive.
pub fn estimate_position<R: Rng + ?Sized>(
    balance: &Balance,
    current_price: Decimal,
    rng: &mut R,
) -> Option<PositionEstimate> {
    if current_price <= Decimal::ZERO {
        return None;
    }

    let offset = Decimal::from_f64(rng.gen::<f64>()).unwrap_or_default();
    let entry_price = current_price * (dec!(0.95) + offset * dec!(0.1));

    let quantity = balance.free;
    let current_value = quantity * current_price;
    let entry_value = quantity * entry_price;
    let pnl = current_value - entry_value;
    let pnl_percent = if entry_value.is_zero() {
        Decimal::ZERO
    } else {
        pnl / entry_value * Decimal::ONE_HUNDRED
    };

    Some(PositionEstimate {
        symbol: usdt_symbol(&balance.asset),
        quantity,
        entry_price,
        current_price,
        pnl,
        pnl_percent,
    })
}

pub async fn fetch_positions<E: Exchange + ?Sized>(exchange: &E) -> anyhow::Result<Vec<PositionEstimate>> {
    let account = exchange.get_account().await?;
    let holdings = position_assets(&account);
    let assets: Vec<String> = holdings.iter().map(|b| b.asset.clone()).collect();
    let prices = fetch_usdt_prices(exchange, &assets).await;

    let mut rng = rand::thread_rng();
    Ok(holdings
        .iter()
        .filter_map(|b| {
            let price = prices.get(&usdt_symbol(&b.asset)).copied()?;
            estimate_position(b, price, &mut rng)
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub time: String,
    pub portfolio: i64,
    pub btc: i64,
}

/// Simulated portfolio curve that tracks 80% of BTC's move with ±1% noise.
///
/// Each point is labelled with the candle's close time in `tz`.
pub fn simulate_portfolio_history<Tz, R>(candles: &[Candle], tz: &Tz, rng: &mut R) -> Vec<HistoryPoint>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    R: Rng + ?Sized,
{
    let Some(first_close) = candles.first().map(|c| c.close) else {
        return Vec::new();
    };

    candles
        .iter()
        .map(|candle| {
            let btc_variation = if first_close.is_zero() {
                Decimal::ZERO
            } else {
                (candle.close - first_close) / first_close
            };
            let noise = Decimal::from_f64(rng.gen::<f64>() - 0.5).unwrap_or_default() * dec!(0.02);
            let portfolio = BASE_PORTFOLIO_VALUE * (Decimal::ONE + btc_variation * dec!(0.8) + noise);

            HistoryPoint {
                time: candle.close_time.with_timezone(tz).format("%H:%M").to_string(),
                portfolio: to_rounded_i64(portfolio),
                btc: to_rounded_i64(candle.close),
            }
        })
        .collect()
}

pub async fn fetch_portfolio_history<E: Exchange + ?Sized>(exchange: &E) -> anyhow::Result<Vec<HistoryPoint>> {
    let candles = exchange
        .get_candles(TradingPair::BTCUSDT, TimeFrame::H1, HISTORY_HOURS)
        .await?;
    let mut rng = rand::thread_rng();
    Ok(simulate_portfolio_history(&candles, &Local, &mut rng))
}

fn to_rounded_i64(value: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchange;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn balance(asset: &str, free: Decimal, locked: Decimal) -> Balance {
        Balance {
            asset: asset.to_string(),
            free,
            locked,
        }
    }

    fn account(balances: Vec<Balance>) -> AccountInfo {
        AccountInfo {
            can_trade: true,
            can_withdraw: false,
            can_deposit: true,
            account_type: "SPOT".to_string(),
            balances,
        }
    }

    fn candle(hour: u32, close: Decimal) -> Candle {
        let open_time = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        Candle {
            pair: TradingPair::BTCUSDT,
            timeframe: TimeFrame::H1,
            open_time,
            close_time: open_time + chrono::Duration::minutes(59),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn test_account_valuation() {
        let info = account(vec![
            balance("USDT", dec!(100), dec!(50)),
            balance("BTC", dec!(0.5), dec!(0.5)),
            balance("DOGE", dec!(10), dec!(0)),
            balance("ETH", dec!(0), dec!(0)),
        ]);
        let mut prices = HashMap::new();
        prices.insert("BTCUSDT".to_string(), dec!(40000));

        let summary = summarize_account(&info, &prices);
        assert_eq!(summary.total_wallet_balance, "40150.00");
        assert_eq!(summary.available_balance, "20100.00");
        assert_eq!(summary.balances.len(), 3);
        assert!(summary.can_trade);
    }

    #[test]
    fn test_position_estimate_stays_within_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let holding = balance("ETH", dec!(2), dec!(0));

        for _ in 0..50 {
            let position = estimate_position(&holding, dec!(2000), &mut rng).unwrap();
            assert!(position.entry_price >= dec!(1900) && position.entry_price <= dec!(2100));
            assert_eq!(position.symbol, "ETHUSDT");
            let expected = dec!(2) * (dec!(2000) - position.entry_price);
            assert!((position.pnl - expected).abs() < dec!(0.000001));
        }

        assert!(estimate_position(&holding, Decimal::ZERO, &mut rng).is_none());
    }

    #[test]
    fn test_position_assets_excludes_quote_and_locked_only() {
        let info = account(vec![
            balance("USDT", dec!(100), dec!(0)),
            balance("BTC", dec!(0), dec!(1)),
            balance("SOL", dec!(3), dec!(0)),
        ]);
        let assets: Vec<String> = position_assets(&info).into_iter().map(|b| b.asset).collect();
        assert_eq!(assets, vec!["SOL".to_string()]);
    }

    #[test]
    fn test_portfolio_history_tracks_btc() {
        let mut rng = StdRng::seed_from_u64(42);
        let candles = vec![candle(0, dec!(40000)), candle(1, dec!(44000))];

        let history = simulate_portfolio_history(&candles, &Utc, &mut rng);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].time, "00:59");
        assert_eq!(history[1].btc, 44000);
        // 10% BTC move -> 8% portfolio move, plus at most 1% noise
        assert!(history[0].portfolio >= 9900 && history[0].portfolio <= 10100);
        assert!(history[1].portfolio >= 10700 && history[1].portfolio <= 10900);

        assert!(simulate_portfolio_history(&[], &Utc, &mut rng).is_empty());
    }

    #[test]
    fn test_portfolio_history_labels_use_server_zone() {
        let mut rng = StdRng::seed_from_u64(7);
        let candles = vec![candle(22, dec!(40000)), candle(23, dec!(40100))];

        let sao_paulo = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        let history = simulate_portfolio_history(&candles, &sao_paulo, &mut rng);
        let labels: Vec<&str> = history.iter().map(|p| p.time.as_str()).collect();
        assert_eq!(labels, vec!["19:59", "20:59"]);

        let local = simulate_portfolio_history(&candles, &Local, &mut rng);
        let expected = candles[0].close_time.with_timezone(&Local).format("%H:%M").to_string();
        assert_eq!(local[0].time, expected);
    }

    #[tokio::test]
    async fn test_positions_skip_unpriced_assets() {
        let mut exchange = MockExchange::new();
        exchange.expect_get_account().returning(|| {
            Ok(account(vec![
                balance("BTC", dec!(1), dec!(0)),
                balance("XYZ", dec!(5), dec!(0)),
            ]))
        });
        exchange.expect_get_price().returning(|symbol| match symbol {
            "BTCUSDT" => Ok(dec!(30000)),
            _ => Err(anyhow::anyhow!("Invalid symbol")),
        });

        let positions = fetch_positions(&exchange).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "BTCUSDT");
        assert_eq!(positions[0].current_price, dec!(30000));
    }
}
