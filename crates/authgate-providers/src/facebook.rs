//! Facebook Login provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{self, TokenResponse};
use crate::traits::{AuthorizationRequest, OAuthProvider, ProviderError};
use authgate_core::secrets::SecretString;
use authgate_core::{ExternalIdentity, OAuthCredentials, ProviderKind};

const DIALOG_URL: &str = "https://www.facebook.com";
const GRAPH_URL: &str = "https://graph.facebook.com";
const API_VERSION: &str = "v12.0";

/// Facebook Login provider.
pub struct FacebookProvider {
    client: Client,
    app_id: String,
    app_secret: Option<SecretString>,
    dialog_url: String,
    graph_url: String,
}

impl FacebookProvider {
    /// Create a new Facebook provider.
    #[must_use]
    pub fn new(credentials: &OAuthCredentials) -> Self {
        match &credentials.base_url {
            Some(base_url) => Self::with_base_url(credentials, base_url),
            None => Self::with_urls(credentials, DIALOG_URL, GRAPH_URL),
        }
    }

    /// Create with dialog and Graph API rooted at one base URL.
    #[must_use]
    pub fn with_base_url(credentials: &OAuthCredentials, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self::with_urls(credentials, base_url, base_url)
    }

    fn with_urls(credentials: &OAuthCredentials, dialog_url: &str, graph_url: &str) -> Self {
        Self {
            client: http::client(),
            app_id: credentials.client_id.clone(),
            app_secret: credentials.client_secret.clone(),
            dialog_url: dialog_url.to_string(),
            graph_url: graph_url.to_string(),
        }
    }

    /// Look up the large profile picture. Absent on any failure.
    async fn picture_url(&self, user_id: &str) -> Option<String> {
        let secret = self.app_secret.as_ref()?;
        let app_token = format!("{}|{}", self.app_id, secret.expose());

        let response = self
            .client
            .get(format!("{}/{user_id}/picture", self.graph_url))
            .query(&[
                ("type", "large"),
                ("redirect", "false"),
                ("access_token", app_token.as_str()),
            ])
            .send()
            .await
            .ok()?;

        match http::json::<PictureResponse>(response).await {
            Ok(picture) => picture.data.url.filter(|url| !url.is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "facebook picture lookup failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

impl FacebookUser {
    fn into_identity(self) -> Result<ExternalIdentity, ProviderError> {
        let id = self.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::InvalidResponse("facebook profile has no id".to_string())
        })?;
        let mut identity = ExternalIdentity::new(ProviderKind::Facebook).with_id(id);
        identity.email = self.email;
        identity.name = self.name;
        Ok(identity)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PictureResponse {
    #[serde(default)]
    data: PictureData,
}

#[derive(Debug, Default, Deserialize)]
struct PictureData {
    url: Option<String>,
}

#[async_trait]
impl OAuthProvider for FacebookProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Facebook
    }

    fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            name: "Facebook".to_string(),
            base_url: format!("{}/{API_VERSION}/dialog/oauth", self.dialog_url),
            client_id: self.app_id.clone(),
            scope: "public_profile email".to_string(),
            response_type: "code".to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, ProviderError> {
        let secret = http::require_secret(self.app_secret.as_ref())?;

        let response = self
            .client
            .get(format!("{}/{API_VERSION}/oauth/access_token", self.graph_url))
            .query(&[
                ("client_id", self.app_id.as_str()),
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
            .get(format!("{}/{API_VERSION}/me", self.graph_url))
            .query(&[("access_token", token), ("fields", "id,name,email")])
            .send()
            .await?;

        let mut identity = http::json::<FacebookUser>(response).await?.into_identity()?;
        if let Some(id) = identity.id.clone() {
            identity.picture = self.picture_url(&id).await;
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::{Json, Router, extract::Path, routing::get};

    #[test]
    fn test_authorization_request() {
        let provider = FacebookProvider::new(&OAuthCredentials::new("fb-app", "fb-secret"));
        let request = provider.describe_authorization_request("https://app/cb");
        assert_eq!(request.base_url, "https://www.facebook.com/v12.0/dialog/oauth");
        assert_eq!(request.scope, "public_profile email");
        assert_eq!(request.client_id, "fb-app");
    }

    #[tokio::test]
    async fn test_fetch_identity_with_picture() {
        let router = Router::new()
            .route(
                "/v12.0/me",
                get(|| async {
                    Json(serde_json::json!({ "id": "42", "name": "Carol", "email": "c@example.com" }))
                }),
            )
            .route(
                "/{id}/picture",
                get(|Path(id): Path<String>| async move {
                    Json(serde_json::json!({ "data": { "url": format!("https://cdn/{id}.jpg") } }))
                }),
            );
        let base = testing::serve(router).await;
        let provider =
            FacebookProvider::with_base_url(&OAuthCredentials::new("fb-app", "fb-secret"), &base);

        let identity = provider.fetch_identity("EAAB").await.unwrap();
        assert_eq!(identity.id.as_deref(), Some("42"));
        assert_eq!(identity.email.as_deref(), Some("c@example.com"));
        assert_eq!(identity.picture.as_deref(), Some("https://cdn/42.jpg"));
    }

    #[tokio::test]
    async fn test_picture_failure_is_not_fatal() {
        let router = Router::new().route(
            "/v12.0/me",
            get(|| async { Json(serde_json::json!({ "id": "42" })) }),
        );
        let base = testing::serve(router).await;
        let provider =
            FacebookProvider::with_base_url(&OAuthCredentials::new("fb-app", "fb-secret"), &base);

        let identity = provider.fetch_identity("EAAB").await.unwrap();
        assert_eq!(identity.picture, None);
    }
}
