use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{NotificationError, Notifier};

const SENDER_NAME: &str = "Trading Bot";

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Sends HTML mail through an SMTP relay using STARTTLS.
pub struct EmailSender {
    config: SmtpConfig,
    recipient: String,
}

impl EmailSender {
    /// Mail goes to `recipient`, or back to the SMTP account when none is given.
    pub fn new(config: SmtpConfig, recipient: Option<&str>) -> Self {
        let recipient = recipient
            .map(str::to_string)
            .unwrap_or_else(|| config.username.clone());
        Self { config, recipient }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotificationError> {
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), self.config.username.parse()?);

        Ok(Message::builder()
            .from(from)
            .to(self.recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(render_html(body))?)
    }

    pub async fn send_mail(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let message = self.build_message(subject, body)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        mailer.send(message).await?;
        info!("Email sent to {}", self.recipient);
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailSender {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.send_mail(&format!("🤖 {}", subject), body).await
    }
}

pub fn render_html(body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #10B981;">🤖 Trading Bot Notification</h2>
  <p>{}</p>
  <hr style="border: 1px solid #e5e7eb;">
  <p style="color: #6b7280; font-size: 12px;">This is an automated message from your Trading Bot.</p>
</div>"#,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "bot@example.com".to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn test_recipient_falls_back_to_smtp_user() {
        assert_eq!(EmailSender::new(config(), None).recipient(), "bot@example.com");
        assert_eq!(
            EmailSender::new(config(), Some("me@example.com")).recipient(),
            "me@example.com"
        );
    }

    #[test]
    fn test_message_headers() {
        let sender = EmailSender::new(config(), Some("me@example.com"));
        let message = sender.build_message("Test", "All good").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Trading Bot"));
        assert!(raw.contains("<bot@example.com>"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("Subject: Test"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let sender = EmailSender::new(config(), Some("not an address"));
        assert!(matches!(
            sender.build_message("Test", "body"),
            Err(NotificationError::Address(_))
        ));
    }

    #[test]
    fn test_html_wraps_body() {
        let html = render_html("Hello there");
        assert!(html.contains("<p>Hello there</p>"));
        assert!(html.starts_with("<div"));
    }
}
