//! Parameters read from both the query string and the request body.

use axum::extract::{Form, FromRequest, Json, Query, Request};
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::auth::{CallbackParams, non_empty};
use crate::error::AuthError;

/// Parameter sets that combine query and body values.
pub trait MergeParams: DeserializeOwned + Default + Send {
    /// Combine the two sources.
    fn merge(body: Self, query: Self) -> Self;
}

/// Extractor for a [`MergeParams`] set.
///
/// The body is read as JSON or as a urlencoded form depending on its
/// content type; any other body is ignored.
#[derive(Debug, Clone)]
pub struct Params<T>(pub T);

impl<S, T> FromRequest<S> for Params<T>
where
    S: Send + Sync,
    T: MergeParams,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<T>::try_from_uri(req.uri())
            .map_err(|err| AuthError::BadRequest(err.body_text()))?;

        if req.method() == Method::GET || req.method() == Method::HEAD {
            return Ok(Self(T::merge(T::default(), query)));
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = if content_type.starts_with("application/json") {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|err| AuthError::BadRequest(err.body_text()))?;
            body
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<T>::from_request(req, state)
                .await
                .map_err(|err| AuthError::BadRequest(err.body_text()))?;
            body
        } else {
            T::default()
        };

        Ok(Self(T::merge(body, query)))
    }
}

impl MergeParams for CallbackParams {
    fn merge(body: Self, query: Self) -> Self {
        Self::merge(body, query)
    }
}

/// `start-auth-email` parameters.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartEmailParams {
    /// Address to send the login link to.
    #[validate(required, email)]
    pub email: Option<String>,
    /// Where to land after login.
    pub original_url: Option<String>,
}

impl MergeParams for StartEmailParams {
    fn merge(body: Self, query: Self) -> Self {
        Self {
            email: non_empty(body.email.or(query.email).map(|e| e.trim().to_string())),
            original_url: non_empty(body.original_url).or(non_empty(query.original_url)),
        }
    }
}

/// `auth-token` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenParams {
    /// Login token from the e-mail.
    pub token: Option<String>,
}

impl MergeParams for TokenParams {
    fn merge(body: Self, query: Self) -> Self {
        Self {
            token: non_empty(query.token)
                .or(non_empty(body.token))
                .map(|t| t.trim().to_string()),
        }
    }
}

/// Query string of the login page and client config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    /// Pending original URL.
    pub original_url: Option<String>,
    /// Login step.
    pub step: Option<String>,
    /// Address the login e-mail went to.
    pub entered_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract<T: MergeParams>(request: axum::http::Request<Body>) -> Result<T, AuthError> {
        Params::<T>::from_request(request, &()).await.map(|Params(p)| p)
    }

    #[tokio::test]
    async fn test_form_body_wins_over_query() {
        let request = axum::http::Request::post("/cb?code=q&state=s")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("code=b&userId=42"))
            .unwrap();
        let params: CallbackParams = extract(request).await.unwrap();
        assert_eq!(params.code.as_deref(), Some("b"));
        assert_eq!(params.state.as_deref(), Some("s"));
        assert_eq!(params.user_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = axum::http::Request::post("/cb")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"identityToken":"t","userId":"7"}"#))
            .unwrap();
        let params: CallbackParams = extract(request).await.unwrap();
        assert_eq!(params.identity_token.as_deref(), Some("t"));
        assert_eq!(params.user_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_query_user_id_ignored() {
        let request = axum::http::Request::get("/cb?accessToken=a&userId=7")
            .body(Body::empty())
            .unwrap();
        let params: CallbackParams = extract(request).await.unwrap();
        assert_eq!(params.access_token.as_deref(), Some("a"));
        assert_eq!(params.user_id, None);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = axum::http::Request::post("/cb")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        let result: Result<CallbackParams, _> = extract(request).await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
    }

    #[test]
    fn test_token_query_wins() {
        let merged = TokenParams::merge(
            TokenParams {
                token: Some("body".to_string()),
            },
            TokenParams {
                token: Some(" query ".to_string()),
            },
        );
        assert_eq!(merged.token.as_deref(), Some("query"));
    }

    #[test]
    fn test_start_email_validation() {
        let ok = StartEmailParams {
            email: Some("a@example.com".to_string()),
            original_url: None,
        };
        assert!(ok.validate().is_ok());

        let bad = StartEmailParams {
            email: Some("not-an-address".to_string()),
            original_url: None,
        };
        assert!(bad.validate().is_err());
        assert!(StartEmailParams::default().validate().is_err());
    }
}
