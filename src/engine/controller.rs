use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Start,
    Stop,
}

impl FromStr for ToggleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            _ => Err("Invalid action. Use \"start\" or \"stop\"".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingState {
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
}

/// The dashboard's trading switch.
///
/// Only the flag and its timestamps live here; no order flow hangs off it.
pub struct TradingController {
    state: RwLock<TradingState>,
    state_tx: broadcast::Sender<TradingState>,
}

impl TradingController {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(32);
        Self {
            state: RwLock::new(TradingState::default()),
            state_tx,
        }
    }

    /// Marks trading active. Calling it again restarts the clock.
    pub async fn start(&self) -> TradingState {
        let mut state = self.state.write().await;
        state.is_active = true;
        state.start_time = Some(Utc::now());
        state.stop_time = None;

        info!("Trading started at {:?}", state.start_time);
        let snapshot = state.clone();
        let _ = self.state_tx.send(snapshot.clone());
        snapshot
    }

    pub async fn stop(&self) -> TradingState {
        let mut state = self.state.write().await;
        state.is_active = false;
        state.stop_time = Some(Utc::now());

        info!("Trading stopped at {:?}", state.stop_time);
        let snapshot = state.clone();
        let _ = self.state_tx.send(snapshot.clone());
        snapshot
    }

    pub async fn apply(&self, action: ToggleAction) -> TradingState {
        match action {
            ToggleAction::Start => self.start().await,
            ToggleAction::Stop => self.stop().await,
        }
    }

    pub async fn state(&self) -> TradingState {
        self.state.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradingState> {
        self.state_tx.subscribe()
    }
}

impl Default for TradingController {
    fn default() -> Self {
        Self::new()
    }
}
