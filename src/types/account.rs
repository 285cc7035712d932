use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub can_deposit: bool,
    pub account_type: String,
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    /// Balances holding a non-zero free or locked amount.
    pub fn non_zero_balances(&self) -> Vec<Balance> {
        self.balances
            .iter()
            .filter(|b| !b.is_empty())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn is_empty(&self) -> bool {
        self.free <= Decimal::ZERO && self.locked <= Decimal::ZERO
    }
}

/// One execution from the account trade list.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub id: u64,
    pub symbol: String,
    pub price: Decimal,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    pub time: DateTime<Utc>,
    pub is_buyer: bool,
    pub is_maker: bool,
    pub is_best_match: bool,
}

impl Fill {
    pub fn side(&self) -> Side {
        if self.is_buyer {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}
