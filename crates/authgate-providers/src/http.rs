//! Shared vendor HTTP plumbing.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::traits::ProviderError;
use authgate_core::secrets::SecretString;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client used for vendor calls.
pub(crate) fn client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("authgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Decode a JSON body, turning non-success statuses into [`ProviderError::Api`].
pub(crate) async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    /// Extract the access token.
    ///
    /// Some vendors report failures with a 200 and an `error` field.
    pub(crate) fn into_access_token(self) -> Result<SecretString, ProviderError> {
        if let Some(error) = self.error {
            let detail = self.error_description.unwrap_or_else(|| error.to_string());
            return Err(ProviderError::InvalidResponse(detail));
        }
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(SecretString::new(token)),
            _ => Err(ProviderError::InvalidResponse(
                "no access_token in response".to_string(),
            )),
        }
    }
}

/// Read a required client secret.
pub(crate) fn require_secret(secret: Option<&SecretString>) -> Result<&str, ProviderError> {
    secret
        .map(SecretString::expose)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Config("client secret is not configured".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_ok() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"gho_123","token_type":"bearer"}"#).unwrap();
        assert_eq!(response.into_access_token().unwrap().expose(), "gho_123");
    }

    #[test]
    fn test_token_response_error_field() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        )
        .unwrap();
        let err = response.into_access_token().unwrap_err();
        assert!(err.to_string().contains("incorrect or expired"));
    }

    #[test]
    fn test_token_response_missing_token() {
        let response: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response.into_access_token(),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_require_secret() {
        assert!(require_secret(None).is_err());
        assert!(require_secret(Some(&SecretString::new(""))).is_err());
        assert_eq!(require_secret(Some(&SecretString::new("s"))).unwrap(), "s");
    }
}
