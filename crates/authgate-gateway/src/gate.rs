//! Session gate.
//!
//! Every request passes through here first. Gateway routes are let through
//! untouched, authenticated requests continue to the upstream with the
//! identity attached, and everything else is sent to the login page.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use authgate_core::ExternalIdentity;

use crate::error::AuthError;
use crate::routes::found;
use crate::server::GatewayState;
use crate::session::with_cookie;

/// Identity of the logged-in user, available to the upstream handler.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub ExternalIdentity);

/// Whether `path` belongs to the gateway mounted at `base`.
#[must_use]
pub fn is_gateway_path(path: &str, base: &str) -> bool {
    path.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Gate middleware.
pub async fn session_gate(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let base = state.config.app_gateway_relative_uri.as_str();
    if is_gateway_path(request.uri().path(), base) {
        return next.run(request).await;
    }

    let current = match state.load_session(request.headers()).await {
        Ok(current) => current,
        Err(err) => return AuthError::from(err).into_response(),
    };

    if let Some(identity) = current.session.authenticated_user.clone() {
        request.extensions_mut().insert(AuthenticatedUser(identity));
        // Activity slides the cookie lifetime along with the stored session.
        let cookie = state.cookie_for(&current.handle).ok();
        return with_cookie(cookie, next.run(request).await);
    }

    let original_url = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
    debug!(original_url = %original_url, "unauthenticated request, redirecting to login");

    let mut session = current.session;
    session.remember_original_url(original_url.clone());
    let cookie = match state.save_session(&current.handle, session).await {
        Ok(cookie) => cookie,
        Err(err) => return err.into_response(),
    };

    let encoded: String = url::form_urlencoded::byte_serialize(original_url.as_bytes()).collect();
    with_cookie(cookie, found(&format!("{base}/login?originalUrl={encoded}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_gateway_path() {
        let base = "/_auth-gateway";
        assert!(is_gateway_path("/_auth-gateway", base));
        assert!(is_gateway_path("/_auth-gateway/login", base));
        assert!(!is_gateway_path("/_auth-gatewayx", base));
        assert!(!is_gateway_path("/dashboard", base));
        assert!(!is_gateway_path("/", base));
    }
}
