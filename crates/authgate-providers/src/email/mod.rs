//! E-mail magic-link provider.
//!
//! A login token is a signed, audience-bound JWT that is mailed to the user
//! both as a clickable link and as a literal code. Tokens are not stored and
//! stay usable until they expire.

mod sender;
mod token;

use std::sync::Arc;

pub use sender::{EmailError, EmailMessage, EmailSender, LogEmailSender, SmtpEmailSender};
pub use token::{DEFAULT_TOKEN_TTL, EmailTokenClaims, EmailTokenSigner, TokenError};

use authgate_core::Config;

/// E-mail magic-link provider.
pub struct EmailProvider {
    signer: EmailTokenSigner,
    sender: Arc<dyn EmailSender>,
}

impl EmailProvider {
    /// Create from a signer and a delivery backend.
    #[must_use]
    pub fn new(signer: EmailTokenSigner, sender: Arc<dyn EmailSender>) -> Self {
        Self { signer, sender }
    }

    /// Build from config. `Ok(None)` when the e-mail flow is not configured.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay settings are unusable.
    pub fn from_config(config: &Config) -> Result<Option<Self>, EmailError> {
        let (Some(email), Some(secret)) = (&config.email, &config.token_signing_secret) else {
            return Ok(None);
        };

        let sender: Arc<dyn EmailSender> = match &email.smtp {
            Some(smtp) => Arc::new(SmtpEmailSender::new(smtp, email.from_address.clone())?),
            None => {
                tracing::warn!("no SMTP relay configured, login e-mails will only be logged");
                Arc::new(LogEmailSender)
            }
        };

        Ok(Some(Self::new(
            EmailTokenSigner::new(secret.expose().as_bytes()),
            sender,
        )))
    }

    /// Issue a login token bound to `app_url`.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn issue_token(
        &self,
        email: &str,
        original_url: Option<&str>,
        app_url: &str,
    ) -> Result<String, TokenError> {
        self.signer.issue(email, original_url, app_url)
    }

    /// Verify a login token against `app_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid, expired or for another app.
    pub fn verify_token(&self, token: &str, app_url: &str) -> Result<EmailTokenClaims, TokenError> {
        self.signer.verify(token, app_url)
    }

    /// Mail the token as a link and a code.
    ///
    /// # Errors
    ///
    /// Returns error if delivery fails.
    pub async fn send_login_email(
        &self,
        email: &str,
        token: &str,
        app_url: &str,
        gateway_uri: &str,
    ) -> Result<(), EmailError> {
        let message = login_message(email, token, app_url, gateway_uri);
        tracing::info!(to = %email, "sending login e-mail");
        self.sender.send(&message).await
    }
}

/// Compose the login e-mail.
#[must_use]
pub fn login_message(email: &str, token: &str, app_url: &str, gateway_uri: &str) -> EmailMessage {
    let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    let link = format!("{app_url}{gateway_uri}/auth-token?token={encoded}");

    EmailMessage {
        to: email.to_string(),
        subject: format!("Access link for {app_url}"),
        text: format!(
            "Hello,\n\n\
             Your code for accessing {app_url} is: {token}\n\n\
             Use it in login form or click this link: {link}\n\n\
             BR,\n  Support team\n"
        ),
    }
}
