use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use super::Exchange;
use crate::types::{AccountInfo, Balance, Candle, Fill, Ticker, TimeFrame, TradingPair};

pub const BINANCE_API: &str = "https://api.binance.com";

/// Binance caps a single klines request at this many rows.
const KLINES_PAGE_LIMIT: usize = 1000;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceClient {
    pub fn new(api_key: String, secret_key: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn public_only(base_url: &str) -> Self {
        Self::new(String::new(), String::new(), base_url)
    }

    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| anyhow!("Invalid signing key: {}", e))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_signed_query(&self, params: &BTreeMap<&str, String>) -> Result<String> {
        let timestamp = Utc::now().timestamp_millis();
        let mut query_parts: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        query_parts.push(format!("timestamp={}", timestamp));
        query_parts.push("recvWindow=5000".to_string());
        let query = query_parts.join("&");
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn signed_get(&self, path: &str, params: &BTreeMap<&str, String>) -> Result<Response> {
        if self.api_key.is_empty() || self.secret_key.is_empty() {
            return Err(anyhow!("API keys are required for {}", path));
        }

        let query = self.build_signed_query(params)?;
        let full_url = format!("{}{}?{}", self.base_url, path, query);

        let resp = self
            .client
            .get(&full_url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        check_status(resp).await
    }

    async fn public_get(&self, path_and_query: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self.client.get(&url).send().await?;
        check_status(resp).await
    }

    fn parse_klines(
        &self,
        pair: TradingPair,
        timeframe: TimeFrame,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<Vec<Candle>> {
        rows.into_iter()
            .map(|k| {
                let open_time = k.first().and_then(|v| v.as_i64()).unwrap_or(0);
                let open = k.get(1).and_then(|v| v.as_str()).unwrap_or("0");
                let high = k.get(2).and_then(|v| v.as_str()).unwrap_or("0");
                let low = k.get(3).and_then(|v| v.as_str()).unwrap_or("0");
                let close = k.get(4).and_then(|v| v.as_str()).unwrap_or("0");
                let volume = k.get(5).and_then(|v| v.as_str()).unwrap_or("0");
                let close_time = k.get(6).and_then(|v| v.as_i64()).unwrap_or(0);

                Ok(Candle {
                    pair,
                    timeframe,
                    open_time: millis_to_utc(open_time)?,
                    close_time: millis_to_utc(close_time)?,
                    open: Decimal::from_str(open)?,
                    high: Decimal::from_str(high)?,
                    low: Decimal::from_str(low)?,
                    close: Decimal::from_str(close)?,
                    volume: Decimal::from_str(volume)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    async fn get_ticker(&self, pair: TradingPair) -> Result<Ticker> {
        let resp: TickerResponse = self
            .public_get(&format!("/api/v3/ticker/24hr?symbol={}", pair.as_str()))
            .await?
            .json()
            .await?;

        Ok(Ticker {
            pair,
            price: Decimal::from_str(&resp.last_price)?,
            volume_24h: Decimal::from_str(&resp.volume)?,
            price_change_pct_24h: Decimal::from_str(&resp.price_change_percent)?,
            timestamp: Utc::now(),
        })
    }

    async fn get_candles(&self, pair: TradingPair, timeframe: TimeFrame, limit: u32) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .public_get(&format!(
                "/api/v3/klines?symbol={}&interval={}&limit={}",
                pair.as_str(),
                timeframe.as_str(),
                limit
            ))
            .await?
            .json()
            .await?;

        self.parse_klines(pair, timeframe, rows)
    }

    /// Walks the range page by page since Binance returns at most 1000 candles per call.
    async fn get_historical_candles(
        &self,
        pair: TradingPair,
        timeframe: TimeFrame,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let mut all_candles = Vec::new();
        let mut current_start = start_time.timestamp_millis();
        let end_millis = end_time.timestamp_millis();

        info!(
            "Fetching historical candles for {} from {} to {}",
            pair, start_time, end_time
        );

        loop {
            let rows: Vec<Vec<serde_json::Value>> = self
                .public_get(&format!(
                    "/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
                    pair.as_str(),
                    timeframe.as_str(),
                    current_start,
                    end_millis,
                    KLINES_PAGE_LIMIT
                ))
                .await?
                .json()
                .await?;

            if rows.is_empty() {
                break;
            }

            let batch_len = rows.len();
            let candles = self.parse_klines(pair, timeframe, rows)?;

            if let Some(last) = candles.last() {
                current_start = last.close_time.timestamp_millis() + 1;
            }

            all_candles.extend(candles);

            if batch_len < KLINES_PAGE_LIMIT || current_start >= end_millis {
                break;
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        info!("Fetched {} candles for {}", all_candles.len(), pair);
        Ok(all_candles)
    }

    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        let resp: PriceResponse = self
            .public_get(&format!("/api/v3/ticker/price?symbol={}", symbol))
            .await?
            .json()
            .await?;

        Ok(Decimal::from_str(&resp.price)?)
    }

    async fn get_account(&self) -> Result<AccountInfo> {
        let params = BTreeMap::new();
        let account: AccountResponse = self.signed_get("/api/v3/account", &params).await?.json().await?;

        let balances = account
            .balances
            .into_iter()
            .map(|b| {
                Ok(Balance {
                    free: Decimal::from_str(&b.free)
                        .with_context(|| format!("bad free balance for {}", b.asset))?,
                    locked: Decimal::from_str(&b.locked)
                        .with_context(|| format!("bad locked balance for {}", b.asset))?,
                    asset: b.asset,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Account loaded with {} balances", balances.len());

        Ok(AccountInfo {
            can_trade: account.can_trade,
            can_withdraw: account.can_withdraw,
            can_deposit: account.can_deposit,
            account_type: account.account_type.unwrap_or_else(|| "SPOT".to_string()),
            balances,
        })
    }

    async fn get_my_trades(&self, pair: TradingPair, limit: u32) -> Result<Vec<Fill>> {
        let mut params = BTreeMap::new();
        params.insert("symbol", pair.as_str().to_string());
        params.insert("limit", limit.to_string());

        let rows: Vec<MyTradeResponse> = self.signed_get("/api/v3/myTrades", &params).await?.json().await?;

        rows.into_iter()
            .map(|t| {
                Ok(Fill {
                    id: t.id,
                    symbol: t.symbol,
                    price: Decimal::from_str(&t.price)?,
                    qty: Decimal::from_str(&t.qty)?,
                    quote_qty: Decimal::from_str(&t.quote_qty)?,
                    commission: Decimal::from_str(&t.commission)?,
                    commission_asset: t.commission_asset,
                    time: millis_to_utc(t.time)?,
                    is_buyer: t.is_buyer,
                    is_maker: t.is_maker,
                    is_best_match: t.is_best_match,
                })
            })
            .collect()
    }
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("Invalid timestamp: {}", millis))
}

/// Turns a non-2xx response into an error carrying Binance's `msg` when present.
async fn check_status(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(err) => Err(anyhow!("{}", err.msg)),
        Err(_) => Err(anyhow!("Binance request failed ({}): {}", status, body)),
    }
}

// API Response Types
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(rename = "lastPrice")]
    last_price: String,
    volume: String,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    can_trade: bool,
    can_withdraw: bool,
    can_deposit: bool,
    account_type: Option<String>,
    balances: Vec<BalanceResponse>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyTradeResponse {
    symbol: String,
    id: u64,
    price: String,
    qty: String,
    quote_qty: String,
    commission: String,
    commission_asset: String,
    time: i64,
    is_buyer: bool,
    is_maker: bool,
    is_best_match: bool,
}
