use agenda_core::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::DeliveryError;

/// Delivers a fired reminder. Called at most once per job.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Sends reminders as plain-text mail over SMTPS.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    /// Build the transport from config. No connection is opened until the
    /// first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let from_addr = config.from.as_deref().unwrap_or(&config.username);
        let from = parse_mailbox(from_addr)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay {}: {e}", config.host)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = build_message(&self.from, recipient, subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        info!(%recipient, %subject, "reminder mailed");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

fn build_message(
    from: &Mailbox,
    recipient: &str,
    subject: &str,
    body: &str,
) -> Result<Message, DeliveryError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(recipient)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| DeliveryError::Build(e.to_string()))
}

/// Writes reminders to the log instead of sending them. Used when no SMTP
/// server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        info!(%recipient, %subject, %body, "reminder (log only, no SMTP configured)");
        Ok(())
    }
}
