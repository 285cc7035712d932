use serde::Deserialize;
use std::path::Path;

use crate::crypto::ApiCredentials;
use crate::exchange::binance::BINANCE_API;
use crate::notifications::{SmtpConfig, TelegramConfig};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Process configuration read once at startup.
///
/// Keys are the upper-case environment names (`BINANCE_API_KEY`, `SMTP_HOST`, ...);
/// the optional config file uses the same names in lower case.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub binance_base_url: String,
    pub binance_api_key: Option<String>,
    pub binance_secret_key: Option<String>,
    pub encryption_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            binance_base_url: BINANCE_API.to_string(),
            binance_api_key: None,
            binance_secret_key: None,
            encryption_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_pass: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then the optional file at `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_sources(path, Self::environment())
    }

    /// Values stay strings so digit-only secrets and chat ids keep their
    /// exact text; numeric fields are converted during deserialization.
    fn environment() -> config::Environment {
        config::Environment::default().try_parsing(false)
    }

    fn from_sources(path: Option<&Path>, environment: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder.add_source(environment).build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("binance_base_url", BINANCE_API)?
            .set_default("smtp_port", i64::from(DEFAULT_SMTP_PORT))
    }

    /// Exchange keys from the environment, when both are set.
    pub fn binance_credentials(&self) -> Option<ApiCredentials> {
        match (non_empty(&self.binance_api_key), non_empty(&self.binance_secret_key)) {
            (Some(key), Some(secret)) => Some(ApiCredentials::new(key, secret)),
            _ => None,
        }
    }

    pub fn telegram(&self) -> Option<TelegramConfig> {
        match (non_empty(&self.telegram_bot_token), non_empty(&self.telegram_chat_id)) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig::new(token, chat_id)),
            _ => None,
        }
    }

    pub fn smtp(&self) -> Option<SmtpConfig> {
        match (
            non_empty(&self.smtp_host),
            non_empty(&self.smtp_user),
            non_empty(&self.smtp_pass),
        ) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpConfig {
                host: host.to_string(),
                port: self.smtp_port,
                username: user.to_string(),
                password: pass.to_string(),
            }),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> AppConfig {
        let mut builder = AppConfig::defaults().unwrap();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = build(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.binance_base_url, "https://api.binance.com");
        assert!(config.binance_credentials().is_none());
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn test_credentials_need_both_keys() {
        let config = build(&[("binance_api_key", "key"), ("binance_secret_key", " ")]);
        assert!(config.binance_credentials().is_none());

        let config = build(&[("binance_api_key", "key"), ("binance_secret_key", "secret")]);
        assert_eq!(config.binance_credentials(), Some(ApiCredentials::new("key", "secret")));
    }

    #[test]
    fn test_channel_configs() {
        let config = build(&[
            ("telegram_bot_token", "123:abc"),
            ("telegram_chat_id", "42"),
            ("smtp_host", "smtp.example.com"),
            ("smtp_user", "bot@example.com"),
        ]);
        assert_eq!(config.telegram().unwrap().chat_id, "42");
        // password missing
        assert!(config.smtp().is_none());

        let config = build(&[
            ("smtp_host", "smtp.example.com"),
            ("smtp_port", "2525"),
            ("smtp_user", "bot@example.com"),
            ("smtp_pass", "pw"),
        ]);
        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.username, "bot@example.com");
    }

    #[test]
    fn test_environment_values_keep_their_text() {
        let key = "00123456789012345678901234567890";
        let vars: config::Map<String, String> = [
            ("PORT", "8080"),
            ("SMTP_PORT", "465"),
            ("TELEGRAM_CHAT_ID", "0012345"),
            ("BINANCE_SECRET_KEY", "1e10"),
            ("ENCRYPTION_KEY", key),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let environment = AppConfig::environment().source(Some(vars));
        let config = AppConfig::from_sources(None, environment).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.telegram_chat_id.as_deref(), Some("0012345"));
        assert_eq!(config.binance_secret_key.as_deref(), Some("1e10"));
        assert_eq!(config.encryption_key.as_deref(), Some(key));
    }
}
