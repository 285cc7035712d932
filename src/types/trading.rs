use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradingPair {
    BTCUSDT,
    ETHUSDT,
    BNBUSDT,
    ADAUSDT,
    SOLUSDT,
}

impl TradingPair {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingPair::BTCUSDT => "BTCUSDT",
            TradingPair::ETHUSDT => "ETHUSDT",
            TradingPair::BNBUSDT => "BNBUSDT",
            TradingPair::ADAUSDT => "ADAUSDT",
            TradingPair::SOLUSDT => "SOLUSDT",
        }
    }

    /// Pairs shown on the dashboard and scanned for trade history.
    pub fn tracked() -> Vec<TradingPair> {
        vec![
            TradingPair::BTCUSDT,
            TradingPair::ETHUSDT,
            TradingPair::BNBUSDT,
            TradingPair::ADAUSDT,
            TradingPair::SOLUSDT,
        ]
    }

    /// Pairs offered by the backtest panel.
    pub fn backtestable() -> Vec<TradingPair> {
        vec![
            TradingPair::BTCUSDT,
            TradingPair::ETHUSDT,
            TradingPair::BNBUSDT,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BTCUSDT" => Some(TradingPair::BTCUSDT),
            "ETHUSDT" => Some(TradingPair::ETHUSDT),
            "BNBUSDT" => Some(TradingPair::BNBUSDT),
            "ADAUSDT" => Some(TradingPair::ADAUSDT),
            "SOLUSDT" => Some(TradingPair::SOLUSDT),
            _ => None,
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every balance is valued against this asset.
pub const QUOTE_ASSET: &str = "USDT";

/// Spot symbol for `asset` quoted in USDT, e.g. `BTC` -> `BTCUSDT`.
pub fn usdt_symbol(asset: &str) -> String {
    format!("{}{}", asset, QUOTE_ASSET)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    H1, // 1 hour
    D1, // 1 day
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::H1 => "1h",
            TimeFrame::D1 => "1d",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}
