//! E-mail delivery.
//!
//! `SmtpEmailSender` relays through an SMTP server; `LogEmailSender` writes
//! messages to the log for local development.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use authgate_core::SmtpConfig;

/// E-mail errors.
#[derive(Error, Debug)]
pub enum EmailError {
    /// Malformed address.
    #[error("Invalid address: {0}")]
    Address(String),

    /// Message could not be assembled.
    #[error("Message error: {0}")]
    Message(String),

    /// Relay refused or unreachable.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
}

/// E-mail delivery abstraction.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message.
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// SMTP relay sender.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSender {
    /// Create a sender for the given relay.
    ///
    /// Port 465 uses implicit TLS, loopback hosts use plaintext, anything
    /// else uses STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns error if the relay settings are unusable.
    pub fn new(config: &SmtpConfig, from_address: impl Into<String>) -> Result<Self, EmailError> {
        let builder = if matches!(config.host.as_str(), "localhost" | "127.0.0.1" | "::1") {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        } else if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| EmailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| EmailError::Transport(e.to_string()))?
        };

        let mut builder = builder.port(config.port);
        if let Some(auth) = &config.auth {
            builder = builder.credentials(Credentials::new(
                auth.user.clone(),
                auth.password.expose().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: from_address.into(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let from: lettre::message::Mailbox = self
            .from_address
            .parse()
            .map_err(|e: lettre::address::AddressError| EmailError::Address(e.to_string()))?;
        let to: lettre::message::Mailbox = message
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| EmailError::Address(e.to_string()))?;

        let email = Message::builder()
            .from(from.clone())
            .reply_to(from)
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.text.clone())
            .map_err(|e| EmailError::Message(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Local dev sender that logs messages instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "email send stub"
        );
        Ok(())
    }
}
