use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{api, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::health_check))
        // Binance account and market data
        .route("/api/binance/account", get(api::get_account))
        .route("/api/binance/market-data", get(api::get_market_data))
        .route("/api/binance/positions", get(api::get_positions))
        .route("/api/binance/price-history", get(api::get_price_history))
        .route("/api/binance/trade-history", get(api::get_trade_history))
        // API keys
        .route("/api/check-config", get(api::check_config))
        .route("/api/config/api-keys", post(api::post_api_keys))
        .route("/api/test-connection", post(api::post_test_connection))
        // Settings
        .route(
            "/api/notification-settings",
            get(api::get_notification_settings).post(api::post_notification_settings),
        )
        .route(
            "/api/risk-settings",
            get(api::get_risk_settings).post(api::post_risk_settings),
        )
        .route("/api/test-notification", post(api::post_test_notification))
        // Trading control
        .route(
            "/api/trading/toggle",
            get(api::get_trading_state).post(api::post_trading_toggle),
        )
        .route("/api/backtest", post(api::post_backtest))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API server starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
