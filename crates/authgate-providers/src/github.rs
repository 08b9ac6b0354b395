//! GitHub OAuth provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{self, TokenResponse};
use crate::traits::{AuthorizationRequest, OAuthProvider, ProviderError};
use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, OAuthCredentials, ProviderKind};

const DEFAULT_OAUTH_URL: &str = "https://github.com";
const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub OAuth provider.
pub struct GithubProvider {
    client: Client,
    client_id: String,
    client_secret: Option<SecretString>,
    oauth_url: String,
    api_url: String,
}

impl GithubProvider {
    /// Create a new GitHub provider.
    #[must_use]
    pub fn new(credentials: &OAuthCredentials) -> Self {
        match &credentials.base_url {
            Some(base_url) => Self::with_base_url(credentials, base_url),
            None => Self::with_urls(credentials, DEFAULT_OAUTH_URL, DEFAULT_API_URL),
        }
    }

    /// Create with a single base URL serving both OAuth and API routes
    /// (GitHub Enterprise style or a local stand-in).
    #[must_use]
    pub fn with_base_url(credentials: &OAuthCredentials, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self::with_urls(credentials, base_url, base_url)
    }

    fn with_urls(credentials: &OAuthCredentials, oauth_url: &str, api_url: &str) -> Self {
        Self {
            client: http::client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            oauth_url: oauth_url.to_string(),
            api_url: api_url.to_string(),
        }
    }
}

/// Subset of `GET /user`.
#[derive(Debug, Deserialize)]
struct GithubUser {
    id: Option<u64>,
    login: Option<String>,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

impl GithubUser {
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let Some(id) = self.id else {
            return Err(ProviderError::InvalidResponse(
                "github user has no id".to_string(),
            ));
        };
        let mut identity = ExternalIdentity::new(ProviderKind::Github).with_id(id.to_string());
        identity.login = self.login;
        identity.email = self.email;
        identity.name = self.name;
        identity.picture = self.avatar_url;
        Ok(identity)
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            name: "GitHub".to_string(),
            base_url: format!("{}/login/oauth/authorize", self.oauth_url),
            client_id: self.client_id.clone(),
            scope: "user".to_string(),
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
            .post(format!("{}/login/oauth/access_token", self.oauth_url))
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
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
            .get(format!("{}/user", self.api_url))
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(token)
            .send()
            .await?;

        http::json::<GithubUser>(response).await?.into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::{Form, Json, Router, http::HeaderMap, routing::get, routing::post};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials::new("gh-client", "gh-secret")
    }

    #[test]
    fn test_authorization_request() {
        let provider = GithubProvider::new(&credentials());
        let request = provider.describe_authorization_request("https://app/cb");

        assert_eq!(request.base_url, "https://github.com/login/oauth/authorize");
        assert_eq!(request.scope, "user");
        assert_eq!(request.client_id, "gh-client");
        assert_eq!(request.redirect_uri, "https://app/cb");
        assert!(provider.supports_web_login());
    }

    #[test]
    fn test_user_into_identity() {
        let user: GithubUser = serde_json::from_str(
            r#"{"id":123,"login":"alice","email":null,"name":"Alice","avatar_url":"https://a/x.png"}"#,
        )
        .unwrap();
        let identity = user.into_identity().unwrap();

        assert_eq!(identity.kind, ProviderKind::Github);
        assert_eq!(identity.id.as_deref(), Some("123"));
        assert_eq!(identity.login.as_deref(), Some("alice"));
        assert_eq!(identity.email, None);
        assert_eq!(identity.picture.as_deref(), Some("https://a/x.png"));
    }

    #[test]
    fn test_user_without_id_rejected() {
        let user: GithubUser = serde_json::from_str(r#"{"login":"alice"}"#).unwrap();
        assert!(user.into_identity().is_err());
    }

    #[tokio::test]
    async fn test_exchange_without_secret_fails() {
        let creds = OAuthCredentials {
            client_secret: None,
            ..credentials()
        };
        let provider = GithubProvider::with_base_url(&creds, "http://127.0.0.1:9");
        let result = provider.exchange_code("code", "https://app/cb").await;
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[tokio::test]
    async fn test_exchange_and_fetch_against_stub() {
        let router = Router::new()
            .route(
                "/login/oauth/access_token",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    if form.get("code").map(String::as_str) == Some("good")
                        && form.get("client_secret").map(String::as_str) == Some("gh-secret")
                    {
                        Json(serde_json::json!({ "access_token": "gho_abc" }))
                    } else {
                        Json(serde_json::json!({ "error": "bad_verification_code" }))
                    }
                }),
            )
            .route(
                "/user",
                get(|headers: HeaderMap| async move {
                    assert_eq!(headers["authorization"], "Bearer gho_abc");
                    Json(serde_json::json!({ "id": 123, "login": "alice" }))
                }),
            );
        let base = testing::serve(router).await;
        let provider = GithubProvider::with_base_url(&credentials(), &base);

        let token = provider.exchange_code("good", "https://app/cb").await.unwrap();
        assert_eq!(token.expose(), "gho_abc");

        let identity = provider.fetch_identity(token.expose()).await.unwrap();
        assert_eq!(identity.login.as_deref(), Some("alice"));

        let err = provider.exchange_code("bad", "https://app/cb").await;
        assert!(matches!(err, Err(ProviderError::InvalidResponse(_))));
    }
}
