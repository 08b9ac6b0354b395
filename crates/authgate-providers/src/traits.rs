//! Provider traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, ProviderKind};

/// Provider errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Vendor answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vendor answered but the payload is unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Identity token failed verification.
    #[error("Token verification failed: {0}")]
    Token(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation not offered by this vendor.
    #[error("{0} does not support this operation")]
    Unsupported(ProviderKind),
}

/// Parameters a client needs to start the vendor's authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Vendor display name.
    pub name: String,
    /// Authorization endpoint.
    pub base_url: String,
    /// Client id.
    pub client_id: String,
    /// Requested scope.
    pub scope: String,
    /// OAuth response type.
    pub response_type: String,
    /// Callback URL on this gateway.
    pub redirect_uri: String,
}

impl AuthorizationRequest {
    /// Full authorization URL carrying `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", &self.response_type)
            .append_pair("scope", &self.scope)
            .append_pair("state", state)
            .finish();
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.base_url)
    }
}

/// OAuth identity provider.
///
/// `describe_authorization_request` is pure; the two async operations are
/// the only points where the gateway talks to the vendor.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider kind.
    fn kind(&self) -> ProviderKind;

    /// Describe the authorization request for the login page.
    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, ProviderError>;

    /// Resolve a token into a normalized identity.
    async fn fetch_identity(&self, token: &str) -> Result<ExternalIdentity, ProviderError>;

    /// Whether the browser redirect flow is offered.
    fn supports_web_login(&self) -> bool {
        true
    }
}
