//! Signed e-mail login tokens.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of a login token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Token errors.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Encoding failed.
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// Signature, audience or format rejected.
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Past its expiry.
    #[error("Token expired")]
    Expired,
}

/// Claims carried by an e-mail login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTokenClaims {
    /// E-mail address the token was sent to.
    pub e: String,
    /// Where to go after login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<String>,
    /// Application URL the token is bound to.
    pub aud: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl EmailTokenClaims {
    /// E-mail address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.e
    }

    /// Original URL, when one was captured.
    #[must_use]
    pub fn original_url(&self) -> Option<&str> {
        self.u.as_deref().filter(|u| !u.is_empty())
    }
}

/// HS256 signer for e-mail login tokens.
pub struct EmailTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl EmailTokenSigner {
    /// Create a signer from the shared secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Override the token lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for `email`, bound to `audience`.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn issue(
        &self,
        email: &str,
        original_url: Option<&str>,
        audience: &str,
    ) -> Result<String, TokenError> {
        self.issue_at(email, original_url, audience, Utc::now())
    }

    fn issue_at(
        &self,
        email: &str,
        original_url: Option<&str>,
        audience: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let exp = now + chrono::Duration::from_std(self.ttl).unwrap_or_default();
        let claims = EmailTokenClaims {
            e: email.to_string(),
            u: original_url.map(ToString::to_string),
            aud: audience.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, expiry and audience.
    ///
    /// # Errors
    ///
    /// Returns error if the token is malformed, expired, for another
    /// audience or carries no e-mail.
    pub fn verify(&self, token: &str, audience: &str) -> Result<EmailTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.leeway = 0;

        let data = decode::<EmailTokenClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            },
        )?;

        if data.claims.e.is_empty() {
            return Err(TokenError::Invalid("token carries no e-mail".to_string()));
        }
        Ok(data.claims)
    }
}

impl std::fmt::Debug for EmailTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailTokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
