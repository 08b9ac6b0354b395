//! Request-level errors.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, warn};

use authgate_core::DEFAULT_GATEWAY_URI;

use crate::pages;
use crate::server::GatewayState;
use crate::session::SessionError;

/// Errors raised while handling a gateway request.
///
/// Each renders as an HTML error page; details stay in the log.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed or unexpected callback.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Code exchange with the vendor failed.
    #[error("Code exchange failed: {0}")]
    ProviderExchange(String),

    /// Identity lookup with the vendor failed.
    #[error("Identity lookup failed: {0}")]
    ProviderIdentity(String),

    /// Token identity does not match the claimed user id.
    #[error("External identity does not match the claimed user")]
    ExternalAuthMismatch,

    /// Identity is not on the allow-list.
    #[error("Unauthorized")]
    Unauthorized,

    /// E-mail login token rejected.
    #[error("Invalid login token")]
    TokenInvalid,

    /// Login e-mail could not be sent.
    #[error("E-mail delivery failed: {0}")]
    EmailDelivery(String),

    /// Too many login e-mails requested.
    #[error("Rate limited")]
    RateLimited,

    /// Unknown gateway route.
    #[error("Not found")]
    NotFound,

    /// Session backend failure.
    #[error("Session error: {0}")]
    Session(String),

    /// Gateway misconfiguration discovered at request time.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        Self::Session(err.to_string())
    }
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ProviderExchange(_) | Self::ProviderIdentity(_) | Self::EmailDelivery(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::ExternalAuthMismatch | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the user.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Bad request",
            Self::ProviderExchange(_) | Self::ProviderIdentity(_) => {
                "Authentication provider failure"
            }
            Self::ExternalAuthMismatch | Self::TokenInvalid => "Authentication failed",
            Self::Unauthorized => "Unauthorized",
            Self::EmailDelivery(_) => "Unable to send e-mail",
            Self::RateLimited => "Too many requests",
            Self::NotFound => "Not found",
            Self::Session(_) | Self::Internal(_) => "Internal error",
        }
    }

    fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, status = status.as_u16(), "gateway request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "gateway request rejected");
        }
    }
}

/// Marker left on error responses so they can be re-rendered with the
/// configured gateway path and support link.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ErrorPage(&'static str);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let message = self.public_message();
        let page = pages::error_page(message, DEFAULT_GATEWAY_URI, None);
        let mut response = (self.status(), Html(page)).into_response();
        response.extensions_mut().insert(ErrorPage(message));
        response
    }
}

/// Re-render error pages for this deployment.
pub(crate) async fn localize_error_pages(
    State(state): State<Arc<GatewayState>>,
    response: Response,
) -> Response {
    let Some(ErrorPage(message)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    let page = pages::error_page(
        message,
        &state.config.app_gateway_relative_uri,
        state.config.support_link.as_deref(),
    );
    Response::from_parts(parts, Body::from(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::ProviderExchange("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::ExternalAuthMismatch.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::TokenInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::Session("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = AuthError::ProviderIdentity("token=abc123 rejected".into());
        assert_eq!(err.public_message(), "Authentication provider failure");
        assert!(!err.public_message().contains("abc123"));
    }

    #[tokio::test]
    async fn test_into_response_renders_page() {
        let response = AuthError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("<h2>Unauthorized</h2>"));
        assert!(html.contains("Login again"));
    }
}
