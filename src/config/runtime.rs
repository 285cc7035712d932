use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentRule {
    pub enabled: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub percent: Decimal,
}

impl PercentRule {
    fn in_range(&self) -> bool {
        self.percent >= Decimal::ZERO && self.percent <= Decimal::ONE_HUNDRED
    }
}

/// Risk limits edited from the dashboard. Nothing enforces them against live orders yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskSettings {
    pub stop_loss: PercentRule,
    pub take_profit: PercentRule,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_position_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_daily_loss: Decimal,
    pub max_open_positions: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub risk_per_trade: Decimal,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            stop_loss: PercentRule {
                enabled: true,
                percent: dec!(2),
            },
            take_profit: PercentRule {
                enabled: true,
                percent: dec!(5),
            },
            max_position_size: dec!(10),
            max_daily_loss: dec!(500),
            max_open_positions: 3,
            risk_per_trade: dec!(1),
        }
    }
}

impl RiskSettings {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.stop_loss.in_range() {
            errors.push("Invalid stop loss percentage".to_string());
        }
        if !self.take_profit.in_range() {
            errors.push("Invalid take profit percentage".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailChannel {
    pub enabled: bool,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramChannel {
    pub enabled: bool,
    pub chat_id: String,
    pub bot_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushChannel {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationTypes {
    pub trades: bool,
    pub errors: bool,
    pub daily_reports: bool,
    pub profit_loss: bool,
}

impl Default for NotificationTypes {
    fn default() -> Self {
        Self {
            trades: true,
            errors: true,
            daily_reports: true,
            profit_loss: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub email: EmailChannel,
    pub telegram: TelegramChannel,
    pub push: PushChannel,
    pub frequency: String,
    pub types: NotificationTypes,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: EmailChannel {
                enabled: true,
                address: String::new(),
            },
            telegram: TelegramChannel::default(),
            push: PushChannel { enabled: true },
            frequency: "immediate".to_string(),
            types: NotificationTypes::default(),
        }
    }
}

impl NotificationSettings {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.email.enabled && self.email.address.trim().is_empty() {
            errors.push("Email address is required when email notifications are enabled".to_string());
        }
        if self.telegram.enabled
            && (self.telegram.chat_id.trim().is_empty() || self.telegram.bot_token.trim().is_empty())
        {
            errors.push("Chat ID and bot token are required for Telegram notifications".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Saved email recipient, if email delivery is switched on.
    pub fn email_recipient(&self) -> Option<&str> {
        let address = self.email.address.trim();
        (self.email.enabled && !address.is_empty()).then_some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_defaults_validate() {
        let risk = RiskSettings::default();
        assert!(risk.validate().is_ok());
        assert_eq!(risk.max_open_positions, 3);
        assert_eq!(risk.take_profit.percent, dec!(5));
    }

    #[test]
    fn test_risk_percent_bounds() {
        let mut risk = RiskSettings::default();
        risk.stop_loss.percent = dec!(100);
        risk.take_profit.percent = Decimal::ZERO;
        assert!(risk.validate().is_ok());

        risk.stop_loss.percent = dec!(-1);
        risk.take_profit.percent = dec!(150);
        let errors = risk.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_risk_wire_format() {
        let risk: RiskSettings = serde_json::from_value(json!({
            "stopLoss": { "enabled": false, "percent": 3.5 },
            "maxOpenPositions": 5
        }))
        .unwrap();
        assert!(!risk.stop_loss.enabled);
        assert_eq!(risk.stop_loss.percent, dec!(3.5));
        assert_eq!(risk.max_open_positions, 5);
        assert_eq!(risk.take_profit, RiskSettings::default().take_profit);

        let value = serde_json::to_value(&risk).unwrap();
        assert_eq!(value["maxDailyLoss"], json!(500.0));
    }

    #[test]
    fn test_notification_validation() {
        let mut settings = NotificationSettings::default();
        // email is on by default but has no address yet
        assert!(settings.validate().is_err());

        settings.email.address = "ops@example.com".to_string();
        assert!(settings.validate().is_ok());

        settings.telegram.enabled = true;
        settings.telegram.chat_id = "12345".to_string();
        assert!(settings.validate().is_err());

        settings.telegram.bot_token = "123:abc".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_notification_wire_format() {
        let settings: NotificationSettings = serde_json::from_value(json!({
            "email": { "enabled": false, "address": "" },
            "telegram": { "enabled": true, "chatId": "1", "botToken": "t" },
            "frequency": "hourly",
            "types": { "dailyReports": false }
        }))
        .unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.telegram.chat_id, "1");
        assert!(!settings.types.daily_reports);
        assert!(settings.types.profit_loss);
        assert!(settings.push.enabled);
        assert_eq!(settings.email_recipient(), None);
    }
}
