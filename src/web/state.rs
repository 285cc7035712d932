use std::sync::Arc;
use tracing::debug;

use crate::config::{AppConfig, SettingsManager};
use crate::crypto::{ApiCredentials, CredentialCipher, CredentialStore, CryptoError};
use crate::engine::TradingController;
use crate::exchange::{BinanceClient, Exchange};
use crate::notifications::NotificationDispatcher;

use super::ApiError;

/// Builds an exchange client; `None` means public market data only.
pub type ExchangeFactory = Arc<dyn Fn(Option<ApiCredentials>) -> Arc<dyn Exchange> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub controller: Arc<TradingController>,
    pub settings: Arc<SettingsManager>,
    pub credentials: Arc<CredentialStore>,
    exchange_factory: ExchangeFactory,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let base_url = config.binance_base_url.clone();
        let factory: ExchangeFactory = Arc::new(move |credentials: Option<ApiCredentials>| {
            let client = match credentials {
                Some(c) => BinanceClient::new(c.api_key, c.secret_key, &base_url),
                None => BinanceClient::public_only(&base_url),
            };
            Arc::new(client) as Arc<dyn Exchange>
        });
        Self::with_exchange_factory(config, factory)
    }

    pub fn with_exchange_factory(config: AppConfig, exchange_factory: ExchangeFactory) -> Self {
        Self {
            config: Arc::new(config),
            controller: Arc::new(TradingController::new()),
            settings: Arc::new(SettingsManager::new()),
            credentials: Arc::new(CredentialStore::new()),
            exchange_factory,
        }
    }

    pub fn cipher(&self) -> Result<CredentialCipher, CryptoError> {
        CredentialCipher::from_config(self.config.encryption_key.as_deref())
    }

    /// Environment keys win over keys submitted through the dashboard.
    pub async fn resolve_credentials(&self) -> Option<ApiCredentials> {
        if let Some(credentials) = self.config.binance_credentials() {
            return Some(credentials);
        }

        let cipher = match self.cipher() {
            Ok(cipher) => cipher,
            Err(e) => {
                debug!("Stored API keys unavailable: {}", e);
                return None;
            }
        };
        self.credentials.load_or_log(&cipher).await
    }

    pub async fn has_credentials(&self) -> bool {
        self.config.binance_credentials().is_some() || self.credentials.is_configured().await
    }

    /// Authenticated client for the account endpoints.
    pub async fn exchange(&self) -> Result<Arc<dyn Exchange>, ApiError> {
        let credentials = self
            .resolve_credentials()
            .await
            .ok_or(ApiError::KeysNotConfigured)?;
        Ok(self.exchange_with(credentials))
    }

    pub fn exchange_with(&self, credentials: ApiCredentials) -> Arc<dyn Exchange> {
        (self.exchange_factory)(Some(credentials))
    }

    pub fn public_exchange(&self) -> Arc<dyn Exchange> {
        (self.exchange_factory)(None)
    }

    pub async fn dispatcher(&self) -> NotificationDispatcher {
        let saved = self.settings.notifications().await;
        NotificationDispatcher::from_settings(&self.config, &saved)
    }
}
