use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::analytics::portfolio::{fetch_account_summary, fetch_portfolio_history, fetch_positions};
use crate::analytics::fetch_trade_history;
use crate::config::{NotificationSettings, RiskSettings};
use crate::crypto::ApiCredentials;
use crate::engine::{run_backtest, BacktestRequest, ToggleAction};
use crate::notifications::NotificationKind;
use crate::strategies::fetch_market_data;

use super::{ApiError, AppState};

type ApiResult<T> = Result<T, ApiError>;

/// `{ "success": true, ...body }`
#[derive(Serialize)]
pub struct ApiSuccess<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(body: T) -> Json<Self> {
        Json(Self { success: true, body })
    }
}

fn saved(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": message }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Binance account and market data ===

pub async fn get_account(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let exchange = state.exchange().await?;
    let summary = fetch_account_summary(exchange.as_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to connect to Binance", e))?;
    Ok(ApiSuccess::new(summary))
}

pub async fn get_market_data(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let exchange = state.exchange().await?;
    let data = fetch_market_data(exchange.as_ref()).await;
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn get_positions(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let exchange = state.exchange().await?;
    let positions = fetch_positions(exchange.as_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch positions", e))?;
    Ok(Json(json!({ "success": true, "positions": positions })))
}

pub async fn get_price_history(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let exchange = state.exchange().await?;
    let history = fetch_portfolio_history(exchange.as_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch price history", e))?;
    Ok(Json(json!({ "success": true, "history": history })))
}

pub async fn get_trade_history(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let exchange = state.exchange().await?;
    Ok(ApiSuccess::new(fetch_trade_history(exchange.as_ref()).await))
}

// === API keys ===

pub async fn check_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "configured": state.has_credentials().await }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeysRequest {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
}

impl ApiKeysRequest {
    fn into_credentials(self) -> ApiResult<ApiCredentials> {
        let api_key = self.api_key.trim();
        let secret_key = self.secret_key.trim();
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(ApiError::BadRequest("API key and secret key are required".to_string()));
        }
        Ok(ApiCredentials::new(api_key, secret_key))
    }
}

pub async fn post_api_keys(
    State(state): State<AppState>,
    payload: Result<Json<ApiKeysRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let credentials = request.into_credentials()?;
    let cipher = state.cipher()?;

    state.credentials.save(&cipher, &credentials).await;
    Ok(saved("API keys configured successfully"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionInfo {
    can_trade: bool,
    can_withdraw: bool,
    can_deposit: bool,
    account_type: String,
    balance_count: usize,
}

pub async fn post_test_connection(
    State(state): State<AppState>,
    payload: Result<Json<ApiKeysRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let exchange = state.exchange_with(request.into_credentials()?);

    let account = exchange.get_account().await.map_err(|e| ApiError::Rejected {
        error: e.to_string(),
        details: "Check that your API keys are correct and have the required permissions",
    })?;

    info!("Binance connection test succeeded ({})", account.account_type);
    Ok(Json(json!({
        "success": true,
        "message": "Connected to Binance successfully",
        "accountInfo": ConnectionInfo {
            can_trade: account.can_trade,
            can_withdraw: account.can_withdraw,
            can_deposit: account.can_deposit,
            balance_count: account.balances.len(),
            account_type: account.account_type,
        },
    })))
}

// === Settings ===

pub async fn get_notification_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.notifications().await)
}

pub async fn post_notification_settings(
    State(state): State<AppState>,
    payload: Result<Json<NotificationSettings>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(settings) = payload?;
    state
        .settings
        .update_notifications(settings)
        .await
        .map_err(ApiError::BadRequest)?;
    Ok(saved("Notification settings saved successfully"))
}

pub async fn get_risk_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.risk().await)
}

pub async fn post_risk_settings(
    State(state): State<AppState>,
    payload: Result<Json<RiskSettings>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(settings) = payload?;
    state.settings.update_risk(settings).await.map_err(ApiError::BadRequest)?;
    Ok(saved("Risk settings saved successfully"))
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
}

pub async fn post_test_notification(
    State(state): State<AppState>,
    payload: Result<Json<TestNotificationRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let kind = request
        .kind
        .parse::<NotificationKind>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let report = state.dispatcher().await.send_test(kind).await;
    Ok(Json(report))
}

// === Trading control ===

pub async fn get_trading_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "state": state.controller.state().await }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub action: String,
}

pub async fn post_trading_toggle(
    State(state): State<AppState>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let action = request.action.parse::<ToggleAction>().map_err(ApiError::BadRequest)?;

    let trading = state.controller.apply(action).await;
    let message = match action {
        ToggleAction::Start => "Trading started successfully",
        ToggleAction::Stop => "Trading stopped successfully",
    };
    Ok(Json(json!({ "success": true, "message": message, "state": trading })))
}

// === Backtesting ===

pub async fn post_backtest(
    State(state): State<AppState>,
    payload: Result<Json<BacktestRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let exchange = state.public_exchange();
    let result = run_backtest(exchange.as_ref(), &request).await?;
    Ok(Json(result))
}
