//! Credential exchange and login completion.

mod login;

pub use login::{LoginOutcome, complete_login, safe_redirect_target};

use serde::Deserialize;
use tracing::warn;

use authgate_core::ExternalIdentity;
use authgate_providers::{OAuthProvider, ProviderError};

use crate::error::AuthError;
use crate::session::Session;

/// Parameters an OAuth callback may carry.
///
/// Web flows send `code` and `state`; mobile clients post an
/// `identityToken` or `accessToken` together with the `userId` they claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed anti-CSRF nonce.
    pub state: Option<String>,
    /// Vendor access token (mobile).
    pub access_token: Option<String>,
    /// Vendor identity token (mobile).
    pub identity_token: Option<String>,
    /// User id claimed by a mobile client.
    pub user_id: Option<String>,
}

impl CallbackParams {
    /// Combine body and query parameters.
    ///
    /// Body values win. `identityToken` and `userId` are only honoured in
    /// the body.
    #[must_use]
    pub fn merge(body: Self, query: Self) -> Self {
        Self {
            code: non_empty(body.code).or(non_empty(query.code)),
            state: non_empty(body.state).or(non_empty(query.state)),
            access_token: non_empty(body.access_token).or(non_empty(query.access_token)),
            identity_token: non_empty(body.identity_token),
            user_id: non_empty(body.user_id),
        }
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Turn callback parameters into a verified external identity.
///
/// Exactly one branch runs, chosen in this order:
///
/// 1. `identityToken` + `userId`
/// 2. `accessToken` + `userId`
/// 3. `code` + `state`, where `state` must equal the session's nonce
///
/// Anything else is a bad request. The session is only read.
///
/// # Errors
///
/// Returns [`AuthError`] when the parameters are unusable, the vendor
/// fails, or the token identity differs from the claimed user.
pub async fn authenticate(
    provider: &dyn OAuthProvider,
    session: &Session,
    params: &CallbackParams,
    redirect_uri: &str,
) -> Result<ExternalIdentity, AuthError> {
    match params {
        CallbackParams {
            identity_token: Some(token),
            user_id: Some(user_id),
            ..
        }
        | CallbackParams {
            access_token: Some(token),
            user_id: Some(user_id),
            ..
        } => {
            let identity = provider
                .fetch_identity(token)
                .await
                .map_err(identity_error)?;
            if identity.id.as_deref() != Some(user_id.as_str()) {
                warn!(
                    provider = %provider.kind(),
                    claimed = %user_id,
                    "token identity does not match claimed user"
                );
                return Err(AuthError::ExternalAuthMismatch);
            }
            Ok(identity)
        }
        CallbackParams {
            code: Some(code),
            state: Some(state),
            ..
        } => {
            if session.auth_state.as_deref() != Some(state.as_str()) {
                warn!(provider = %provider.kind(), "OAuth state mismatch");
                return Err(AuthError::BadRequest("state mismatch".to_string()));
            }
            let token = provider
                .exchange_code(code, redirect_uri)
                .await
                .map_err(|err| match err {
                    ProviderError::Unsupported(kind) => {
                        AuthError::BadRequest(format!("{kind} does not offer web login"))
                    }
                    other => AuthError::ProviderExchange(other.to_string()),
                })?;
            provider
                .fetch_identity(token.expose())
                .await
                .map_err(identity_error)
        }
        _ => Err(AuthError::BadRequest(
            "missing callback parameters".to_string(),
        )),
    }
}

fn identity_error(err: ProviderError) -> AuthError {
    AuthError::ProviderIdentity(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use authgate_core::{ProviderKind, SecretString};
    use authgate_providers::AuthorizationRequest;

    #[derive(Default)]
    struct Recorder {
        exchanged: Mutex<Vec<String>>,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OAuthProvider for Recorder {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Github
        }

        fn describe_authorization_request(&self, redirect_uri: &str) -> AuthorizationRequest {
            AuthorizationRequest {
                name: "GitHub".to_string(),
                base_url: "https://github.com/login/oauth/authorize".to_string(),
                client_id: "id".to_string(),
                scope: "user".to_string(),
                response_type: "code".to_string(),
                redirect_uri: redirect_uri.to_string(),
            }
        }

        async fn exchange_code(
            &self,
            code: &str,
            _redirect_uri: &str,
        ) -> Result<SecretString, ProviderError> {
            self.exchanged.lock().unwrap().push(code.to_string());
            Ok(SecretString::new(format!("token-for-{code}")))
        }

        async fn fetch_identity(&self, token: &str) -> Result<ExternalIdentity, ProviderError> {
            self.fetched.lock().unwrap().push(token.to_string());
            Ok(ExternalIdentity::new(ProviderKind::Github)
                .with_id("42")
                .with_login("alice"))
        }
    }

    fn session_with_state(state: Option<&str>) -> Session {
        Session {
            auth_state: state.map(str::to_string),
            ..Session::default()
        }
    }

    fn params(pairs: &[(&str, &str)]) -> CallbackParams {
        let mut p = CallbackParams::default();
        for (k, v) in pairs {
            let v = Some((*v).to_string());
            match *k {
                "code" => p.code = v,
                "state" => p.state = v,
                "accessToken" => p.access_token = v,
                "identityToken" => p.identity_token = v,
                "userId" => p.user_id = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn test_merge_body_wins() {
        let body = params(&[("code", "body-code"), ("identityToken", "t")]);
        let query = params(&[("code", "query-code"), ("state", "s"), ("userId", "42")]);
        let merged = CallbackParams::merge(body, query);
        assert_eq!(merged.code.as_deref(), Some("body-code"));
        assert_eq!(merged.state.as_deref(), Some("s"));
        assert_eq!(merged.identity_token.as_deref(), Some("t"));
        assert_eq!(merged.user_id, None);
    }

    #[tokio::test]
    async fn test_code_flow() {
        let provider = Recorder::default();
        let identity = authenticate(
            &provider,
            &session_with_state(Some("s1")),
            &params(&[("code", "c1"), ("state", "s1")]),
            "https://app/cb",
        )
        .await
        .unwrap();
        assert_eq!(identity.login.as_deref(), Some("alice"));
        assert_eq!(*provider.exchanged.lock().unwrap(), vec!["c1"]);
        assert_eq!(*provider.fetched.lock().unwrap(), vec!["token-for-c1"]);
    }

    #[tokio::test]
    async fn test_state_mismatch_is_bad_request() {
        let provider = Recorder::default();
        let result = authenticate(
            &provider,
            &session_with_state(Some("s1")),
            &params(&[("code", "c1"), ("state", "other")]),
            "https://app/cb",
        )
        .await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_state_is_bad_request() {
        let provider = Recorder::default();
        let result = authenticate(
            &provider,
            &session_with_state(None),
            &params(&[("code", "c1"), ("state", "s1")]),
            "https://app/cb",
        )
        .await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_identity_token_takes_precedence() {
        let provider = Recorder::default();
        let identity = authenticate(
            &provider,
            &session_with_state(Some("s1")),
            &params(&[
                ("identityToken", "id-tok"),
                ("accessToken", "acc-tok"),
                ("userId", "42"),
                ("code", "c1"),
                ("state", "s1"),
            ]),
            "https://app/cb",
        )
        .await
        .unwrap();
        assert_eq!(identity.id.as_deref(), Some("42"));
        assert_eq!(*provider.fetched.lock().unwrap(), vec!["id-tok"]);
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_access_token_user_mismatch() {
        let provider = Recorder::default();
        let result = authenticate(
            &provider,
            &session_with_state(None),
            &params(&[("accessToken", "acc-tok"), ("userId", "7")]),
            "https://app/cb",
        )
        .await;
        assert!(matches!(result, Err(AuthError::ExternalAuthMismatch)));
    }

    #[tokio::test]
    async fn test_nothing_usable_is_bad_request() {
        let provider = Recorder::default();
        let result = authenticate(
            &provider,
            &session_with_state(Some("s1")),
            &params(&[("code", "c1")]),
            "https://app/cb",
        )
        .await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
    }
}
