//! Google OAuth provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{self, TokenResponse};
use crate::traits::{AuthorizationRequest, OAuthProvider, ProviderError};
use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, OAuthCredentials, ProviderKind};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";

/// Google OAuth provider.
pub struct GoogleProvider {
    client: Client,
    client_id: String,
    client_secret: Option<SecretString>,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    /// Create a new Google provider.
    #[must_use]
    pub fn new(credentials: &OAuthCredentials) -> Self {
        if let Some(base_url) = &credentials.base_url {
            return Self::with_base_url(credentials, base_url);
        }
        Self {
            client: http::client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Create with every endpoint rooted at one base URL.
    #[must_use]
    pub fn with_base_url(credentials: &OAuthCredentials, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client: http::client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            authorize_url: format!("{base_url}/o/oauth2/v2/auth"),
            token_url: format!("{base_url}/token"),
            userinfo_url: format!("{base_url}/oauth2/v1/userinfo"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleUserInfo {
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("google userinfo has no id".to_string()))?;
        let mut identity = ExternalIdentity::new(ProviderKind::Google).with_id(id);
        identity.email = self.email;
        identity.name = self.name;
        identity.picture = self.picture;
        Ok(identity)
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            name: "Google".to_string(),
            base_url: self.authorize_url.clone(),
            client_id: self.client_id.clone(),
            scope: "openid email profile".to_string(),
            response_type: "code".to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, ProviderError> {
        let secret = http::require_secret(self.client_secret.as_ref())?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        http::json::<TokenResponse>(response)
            .await?
            .into_access_token()
    }

    async fn fetch_identity(&self, token: &str) -> Result<ExternalIdentity, ProviderError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .query(&[("access_token", token)])
            .send()
            .await?;

        http::json::<GoogleUserInfo>(response).await?.into_identity()
    }
}
