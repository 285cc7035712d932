use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::crypto::CryptoError;
use crate::engine::BacktestError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("API keys not configured")]
    KeysNotConfigured,

    /// The exchange turned the request down; `details` hints at the fix.
    #[error("{error}")]
    Rejected { error: String, details: &'static str },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::KeysNotConfigured | Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Logs `source` and hides it behind a generic message.
    pub fn internal(message: &str, source: impl std::fmt::Display) -> Self {
        error!("{}: {}", message, source);
        Self::Internal(message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            warn!("Request rejected: {}", self);
        }

        let body = match &self {
            Self::Rejected { error, details } => json!({ "error": error, "details": details }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<BacktestError> for ApiError {
    fn from(err: BacktestError) -> Self {
        if err.is_invalid_request() {
            Self::BadRequest(err.to_string())
        } else {
            Self::internal("Backtest failed", err)
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyNotConfigured | CryptoError::InvalidKeyLength(_) => {
                error!("Encryption key unusable: {}", err);
                Self::Internal("Invalid encryption key. It must be 32 characters.".to_string())
            }
            other => Self::internal("Credential encryption failed", other),
        }
    }
}
