//! Microsoft identity platform provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{self, TokenResponse};
use crate::traits::{AuthorizationRequest, OAuthProvider, ProviderError};
use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, OAuthCredentials, ProviderKind};

const LOGIN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0";
const USERINFO_URL: &str = "https://graph.microsoft.com/oidc/userinfo";

/// Microsoft identity platform provider (multi-tenant `common` endpoint).
pub struct MicrosoftProvider {
    client: Client,
    client_id: String,
    client_secret: Option<SecretString>,
    login_url: String,
    userinfo_url: String,
}

impl MicrosoftProvider {
    /// Create a new Microsoft provider.
    #[must_use]
    pub fn new(credentials: &OAuthCredentials) -> Self {
        if let Some(base_url) = &credentials.base_url {
            return Self::with_base_url(credentials, base_url);
        }
        Self {
            client: http::client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            login_url: LOGIN_URL.to_string(),
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
            login_url: format!("{base_url}/common/oauth2/v2.0"),
            userinfo_url: format!("{base_url}/oidc/userinfo"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MicrosoftUserInfo {
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl MicrosoftUserInfo {
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let mut identity = ExternalIdentity::new(ProviderKind::Microsoft);
        identity.id = self.sub.filter(|s| !s.is_empty());
        identity.email = self.email;
        identity.name = self.name;
        identity.picture = self.picture;
        if !identity.has_subject() {
            return Err(ProviderError::InvalidResponse(
                "microsoft userinfo has neither sub nor email".to_string(),
            ));
        }
        Ok(identity)
    }
}

#[async_trait]
impl OAuthProvider for MicrosoftProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Microsoft
    }

    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            name: "Microsoft".to_string(),
            base_url: format!("{}/authorize", self.login_url),
            client_id: self.client_id.clone(),
            scope: "openid email".to_string(),
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
            .post(format!("{}/token", self.login_url))
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
            .bearer_auth(token)
            .send()
            .await?;

        http::json::<MicrosoftUserInfo>(response)
            .await?
            .into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::{Json, Router, http::StatusCode, routing::post};

    #[test]
    fn test_authorization_request() {
        let provider = MicrosoftProvider::new(&OAuthCredentials::new("ms-id", "ms-secret"));
        let request = provider.describe_authorization_request("https://app/cb");
        assert_eq!(
            request.base_url,
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(request.scope, "openid email");
    }

    #[test]
    fn test_sub_maps_to_id() {
        let info: MicrosoftUserInfo =
            serde_json::from_str(r#"{"sub":"AAA-bbb","email":"dan@contoso.com"}"#).unwrap();
        let identity = info.into_identity().unwrap();
        assert_eq!(identity.id.as_deref(), Some("AAA-bbb"));
        assert_eq!(identity.email.as_deref(), Some("dan@contoso.com"));
    }

    #[test]
    fn test_empty_userinfo_rejected() {
        let info: MicrosoftUserInfo = serde_json::from_str("{}").unwrap();
        assert!(info.into_identity().is_err());
    }

    #[tokio::test]
    async fn test_exchange_vendor_failure() {
        let router = Router::new().route(
            "/common/oauth2/v2.0/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "invalid_grant" })),
                )
            }),
        );
        let base = testing::serve(router).await;
        let provider =
            MicrosoftProvider::with_base_url(&OAuthCredentials::new("ms-id", "ms-secret"), &base);

        let result = provider.exchange_code("stale", "https://app/cb").await;
        assert!(matches!(result, Err(ProviderError::Api { status: 400, .. })));
    }
}
