pub mod email;
pub mod telegram;

pub use email::*;
pub use telegram::*;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, NotificationSettings};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Invalid notification type: {0}")]
    InvalidKind(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A channel that can deliver a titled message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Email,
    Telegram,
    Push,
    All,
}

impl FromStr for NotificationKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "telegram" => Ok(Self::Telegram),
            "push" => Ok(Self::Push),
            "all" => Ok(Self::All),
            other => Err(NotificationError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub success: bool,
    pub results: BTreeMap<&'static str, ChannelResult>,
    pub message: String,
}

impl TestReport {
    fn from_results(results: BTreeMap<&'static str, ChannelResult>) -> Self {
        let success = results.values().any(|r| r.success);
        let has_error = results.values().any(|r| !r.success);
        let message = if has_error {
            "Some notifications failed. Check your settings."
        } else {
            "All notifications sent successfully!"
        };

        Self {
            success,
            results,
            message: message.to_string(),
        }
    }
}

struct TestMessage {
    subject: &'static str,
    body: &'static str,
    confirmation: &'static str,
}

const EMAIL_TEST: TestMessage = TestMessage {
    subject: "Trading Bot Test - Email",
    body: "Email configured successfully! The bot can send email notifications.",
    confirmation: "Email sent successfully",
};

const TELEGRAM_TEST: TestMessage = TestMessage {
    subject: "Trading Bot Test",
    body: "✅ Telegram configured successfully!\n\nThe bot can send notifications via Telegram.",
    confirmation: "Telegram message sent successfully",
};

const FULL_EMAIL_TEST: TestMessage = TestMessage {
    subject: "Full Trading Bot Test",
    body: "Full notification test! All channels are working.",
    confirmation: "Email sent successfully",
};

const FULL_TELEGRAM_TEST: TestMessage = TestMessage {
    subject: "Full Trading Bot Test",
    body: "✅ All notification channels tested successfully!",
    confirmation: "Telegram message sent successfully",
};

const PUSH_SIMULATED: &str = "Push notification simulated";

/// Routes test messages to the configured channels.
///
/// Push has no transport yet and always reports success.
pub struct NotificationDispatcher {
    email: Option<Box<dyn Notifier>>,
    telegram: Option<Box<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new(email: Option<Box<dyn Notifier>>, telegram: Option<Box<dyn Notifier>>) -> Self {
        Self { email, telegram }
    }

    /// Email uses the SMTP settings from the environment and the saved
    /// recipient; Telegram prefers the environment bot over the saved one.
    pub fn from_settings(config: &AppConfig, saved: &NotificationSettings) -> Self {
        let email = config
            .smtp()
            .map(|smtp| Box::new(EmailSender::new(smtp, saved.email_recipient())) as Box<dyn Notifier>);

        let telegram = config
            .telegram()
            .or_else(|| saved_telegram(saved))
            .map(|tg| Box::new(TelegramSender::new(tg)) as Box<dyn Notifier>);

        Self::new(email, telegram)
    }

    pub async fn send_test(&self, kind: NotificationKind) -> TestReport {
        info!("Sending {:?} test notification", kind);
        let mut results = BTreeMap::new();

        match kind {
            NotificationKind::Email => {
                results.insert("email", self.deliver_email(&EMAIL_TEST).await);
            }
            NotificationKind::Telegram => {
                results.insert("telegram", self.deliver_telegram(&TELEGRAM_TEST).await);
            }
            NotificationKind::Push => {
                results.insert("push", ChannelResult::ok(PUSH_SIMULATED));
            }
            NotificationKind::All => {
                let (email, telegram) = tokio::join!(
                    self.deliver_email(&FULL_EMAIL_TEST),
                    self.deliver_telegram(&FULL_TELEGRAM_TEST)
                );
                results.insert("email", email);
                results.insert("telegram", telegram);
                results.insert("push", ChannelResult::ok(PUSH_SIMULATED));
            }
        }

        TestReport::from_results(results)
    }

    async fn deliver_email(&self, message: &TestMessage) -> ChannelResult {
        deliver(self.email.as_deref(), "SMTP settings", message).await
    }

    async fn deliver_telegram(&self, message: &TestMessage) -> ChannelResult {
        deliver(self.telegram.as_deref(), "Telegram bot token or chat ID", message).await
    }
}

async fn deliver(channel: Option<&dyn Notifier>, what: &'static str, message: &TestMessage) -> ChannelResult {
    let Some(channel) = channel else {
        return ChannelResult::failed(NotificationError::NotConfigured(what));
    };

    match channel.send(message.subject, message.body).await {
        Ok(()) => ChannelResult::ok(message.confirmation),
        Err(e) => {
            warn!("Test notification failed: {}", e);
            ChannelResult::failed(e)
        }
    }
}

fn saved_telegram(saved: &NotificationSettings) -> Option<TelegramConfig> {
    let token = saved.telegram.bot_token.trim();
    let chat_id = saved.telegram.chat_id.trim();
    (!token.is_empty() && !chat_id.is_empty()).then(|| TelegramConfig::new(token, chat_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn working() -> Box<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().returning(|_, _| Ok(()));
        Box::new(notifier)
    }

    fn failing() -> Box<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .returning(|_, _| Err(NotificationError::SendFailed("Telegram error: Unauthorized".to_string())));
        Box::new(notifier)
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("email".parse::<NotificationKind>().unwrap(), NotificationKind::Email);
        assert_eq!("all".parse::<NotificationKind>().unwrap(), NotificationKind::All);
        assert!(matches!(
            "sms".parse::<NotificationKind>(),
            Err(NotificationError::InvalidKind(_))
        ));
    }

    #[tokio::test]
    async fn test_push_is_simulated() {
        let dispatcher = NotificationDispatcher::new(None, None);
        let report = dispatcher.send_test(NotificationKind::Push).await;
        assert!(report.success);
        assert_eq!(report.results["push"].message.as_deref(), Some(PUSH_SIMULATED));
        assert_eq!(report.message, "All notifications sent successfully!");
    }

    #[tokio::test]
    async fn test_missing_channel_reports_error() {
        let dispatcher = NotificationDispatcher::new(None, None);
        let report = dispatcher.send_test(NotificationKind::Email).await;
        assert!(!report.success);
        assert_eq!(
            report.results["email"].error.as_deref(),
            Some("SMTP settings not configured")
        );
    }

    #[tokio::test]
    async fn test_all_succeeds_when_any_channel_works() {
        let dispatcher = NotificationDispatcher::new(Some(working()), Some(failing()));
        let report = dispatcher.send_test(NotificationKind::All).await;

        assert!(report.success);
        assert_eq!(report.results.len(), 3);
        assert!(report.results["email"].success);
        assert!(!report.results["telegram"].success);
        assert!(report.results["push"].success);
        assert_eq!(report.message, "Some notifications failed. Check your settings.");
    }

    #[tokio::test]
    async fn test_single_channel_only_touches_that_channel() {
        let mut telegram = MockNotifier::new();
        telegram
            .expect_send()
            .withf(|subject, _| subject == "Trading Bot Test")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut email = MockNotifier::new();
        email.expect_send().never();

        let dispatcher = NotificationDispatcher::new(Some(Box::new(email)), Some(Box::new(telegram)));
        let report = dispatcher.send_test(NotificationKind::Telegram).await;
        assert!(report.success);
        assert_eq!(report.results.keys().copied().collect::<Vec<_>>(), vec!["telegram"]);
    }

    #[test]
    fn test_report_wire_format() {
        let mut results = BTreeMap::new();
        results.insert("push", ChannelResult::ok(PUSH_SIMULATED));
        let json = serde_json::to_value(TestReport::from_results(results)).unwrap();
        assert_eq!(json["results"]["push"]["success"], serde_json::json!(true));
        assert!(json["results"]["push"].get("error").is_none());
    }

    #[test]
    fn test_saved_telegram_needs_token_and_chat() {
        let mut saved = NotificationSettings::default();
        assert!(saved_telegram(&saved).is_none());
        saved.telegram.chat_id = "42".to_string();
        saved.telegram.bot_token = "123:abc".to_string();
        assert_eq!(saved_telegram(&saved).unwrap().chat_id, "42");
    }
}
