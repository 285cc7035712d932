use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use super::{NotificationError, Notifier};

pub const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub parse_mode: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            parse_mode: "HTML".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramErrorBody {
    description: Option<String>,
}

pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_api_base(config, TELEGRAM_API)
    }

    pub fn with_api_base(config: TelegramConfig, api_base: &str) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.config.bot_token);

        let params = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": self.config.parse_mode,
        });

        let response = self.client.post(&url).json(&params).send().await?;

        if response.status().is_success() {
            info!("Telegram message sent to chat {}", self.config.chat_id);
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let description = serde_json::from_str::<TelegramErrorBody>(&body)
            .ok()
            .and_then(|b| b.description)
            .unwrap_or_else(|| "Unknown error".to_string());

        error!("Failed to send Telegram message: {} - {}", status, description);
        Err(NotificationError::SendFailed(format!("Telegram error: {}", description)))
    }
}

#[async_trait]
impl Notifier for TelegramSender {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.send_message(&format!("🤖 <b>{}</b>\n\n{}", subject, body)).await
    }
}
