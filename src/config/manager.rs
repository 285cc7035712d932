use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use serde::Serialize;
use tracing::info;

use super::runtime::{NotificationSettings, RiskSettings};

#[derive(Debug, Clone, Serialize)]
pub enum SettingsChangeEvent {
    RiskUpdated(RiskSettings),
    NotificationsUpdated(NotificationSettings),
}

#[derive(Debug, Clone, Default)]
struct DashboardSettings {
    risk: RiskSettings,
    notifications: NotificationSettings,
}

/// In-memory holder for the settings the dashboard edits.
///
/// Updates are validated first; a rejected update leaves the stored value untouched.
pub struct SettingsManager {
    settings: Arc<RwLock<DashboardSettings>>,
    change_tx: broadcast::Sender<SettingsChangeEvent>,
}

impl SettingsManager {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self {
            settings: Arc::new(RwLock::new(DashboardSettings::default())),
            change_tx,
        }
    }

    pub async fn risk(&self) -> RiskSettings {
        self.settings.read().await.risk.clone()
    }

    pub async fn notifications(&self) -> NotificationSettings {
        self.settings.read().await.notifications.clone()
    }

    pub async fn update_risk(&self, risk: RiskSettings) -> Result<(), String> {
        risk.validate().map_err(|errors| errors.join(", "))?;

        self.settings.write().await.risk = risk.clone();

        info!(
            "Risk settings updated: stop_loss={}%, take_profit={}%, max_open_positions={}",
            risk.stop_loss.percent, risk.take_profit.percent, risk.max_open_positions
        );
        let _ = self.change_tx.send(SettingsChangeEvent::RiskUpdated(risk));
        Ok(())
    }

    pub async fn update_notifications(&self, notifications: NotificationSettings) -> Result<(), String> {
        notifications.validate().map_err(|errors| errors.join(", "))?;

        self.settings.write().await.notifications = notifications.clone();

        info!(
            "Notification settings updated: email={}, telegram={}, push={}",
            notifications.email.enabled, notifications.telegram.enabled, notifications.push.enabled
        );
        let _ = self
            .change_tx
            .send(SettingsChangeEvent::NotificationsUpdated(notifications));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChangeEvent> {
        self.change_tx.subscribe()
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SettingsManager {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            change_tx: self.change_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_rejected_update_keeps_previous() {
        let manager = SettingsManager::new();
        let mut risk = RiskSettings::default();
        risk.stop_loss.percent = dec!(120);

        let err = manager.update_risk(risk).await.unwrap_err();
        assert!(err.contains("stop loss"));
        assert_eq!(manager.risk().await, RiskSettings::default());
    }

    #[tokio::test]
    async fn test_update_broadcasts_change() {
        let manager = SettingsManager::new();
        let mut rx = manager.subscribe();

        let mut risk = RiskSettings::default();
        risk.max_open_positions = 7;
        manager.update_risk(risk).await.unwrap();

        assert_eq!(manager.risk().await.max_open_positions, 7);
        match rx.recv().await.unwrap() {
            SettingsChangeEvent::RiskUpdated(r) => assert_eq!(r.max_open_positions, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let manager = SettingsManager::new();
        let other = manager.clone();

        let mut notifications = NotificationSettings::default();
        notifications.email.address = "me@example.com".to_string();
        other.update_notifications(notifications).await.unwrap();

        assert_eq!(manager.notifications().await.email.address, "me@example.com");
    }
}
