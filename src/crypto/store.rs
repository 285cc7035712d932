use tokio::sync::RwLock;
use tracing::{error, info};

use super::{CredentialCipher, CryptoError};

#[derive(Debug, Clone)]
struct EncryptedCredentials {
    api_key: String,
    secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret_key: String,
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

/// Holds submitted exchange keys, encrypted, for the lifetime of the process.
#[derive(Default)]
pub struct CredentialStore {
    stored: RwLock<Option<EncryptedCredentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, cipher: &CredentialCipher, credentials: &ApiCredentials) {
        let encrypted = EncryptedCredentials {
            api_key: cipher.encrypt(&credentials.api_key),
            secret_key: cipher.encrypt(&credentials.secret_key),
        };
        *self.stored.write().await = Some(encrypted);
        info!("API keys encrypted and stored");
    }

    pub async fn is_configured(&self) -> bool {
        self.stored.read().await.is_some()
    }

    pub async fn load(&self, cipher: &CredentialCipher) -> Result<Option<ApiCredentials>, CryptoError> {
        let stored = self.stored.read().await;
        let Some(encrypted) = stored.as_ref() else {
            return Ok(None);
        };

        let credentials = ApiCredentials {
            api_key: cipher.decrypt(&encrypted.api_key)?,
            secret_key: cipher.decrypt(&encrypted.secret_key)?,
        };
        Ok(Some(credentials))
    }

    /// Like [`load`](Self::load) but logs and swallows decryption failures.
    pub async fn load_or_log(&self, cipher: &CredentialCipher) -> Option<ApiCredentials> {
        match self.load(cipher).await {
            Ok(credentials) => credentials,
            Err(e) => {
                error!("Failed to decrypt stored API keys: {}", e);
                None
            }
        }
    }
}
