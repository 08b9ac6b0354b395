//! E-mail magic-link routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::{info, warn};
use validator::Validate;

use authgate_core::ExternalIdentity;

use super::{Params, StartEmailParams, TokenParams, found};
use crate::auth::{LoginOutcome, complete_login};
use crate::error::AuthError;
use crate::server::GatewayState;
use crate::session::{CurrentSession, with_cookie};

/// Mail a login token and send the browser to the "check your inbox" step.
pub(super) async fn start_auth_email(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Params(params): Params<StartEmailParams>,
) -> Result<Response, AuthError> {
    let provider = state.email.as_ref().ok_or(AuthError::NotFound)?;

    params
        .validate()
        .map_err(|_| AuthError::BadRequest("invalid e-mail address".to_string()))?;
    let StartEmailParams {
        email: Some(email),
        original_url,
    } = params
    else {
        return Err(AuthError::BadRequest("missing e-mail address".to_string()));
    };

    if !state.email_limiter.check(&email) {
        warn!(email = %email, "login e-mail rate limit exceeded");
        return Err(AuthError::RateLimited);
    }

    let app_url = state.require_app_url(&headers)?;
    let base = &state.config.app_gateway_relative_uri;

    let token = provider
        .issue_token(&email, original_url.as_deref(), app_url)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    provider
        .send_login_email(&email, &token, app_url, base)
        .await
        .map_err(|err| AuthError::EmailDelivery(err.to_string()))?;

    let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
    Ok(found(&format!(
        "{app_url}{base}/login?step=email2&enteredEmail={encoded}"
    )))
}

/// Verify a login token from the e-mail link or the login form.
pub(super) async fn consume_email_token(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    CurrentSession { handle, session }: CurrentSession,
    Params(params): Params<TokenParams>,
) -> Result<Response, AuthError> {
    let provider = state.email.as_ref().ok_or(AuthError::NotFound)?;
    let app_url = state.require_app_url(&headers)?;

    let token = params.token.ok_or(AuthError::TokenInvalid)?;
    let claims = provider.verify_token(&token, app_url).map_err(|err| {
        info!(error = %err, "login token rejected");
        AuthError::TokenInvalid
    })?;

    let identity = ExternalIdentity::from_email(claims.email());
    let preferred = claims.original_url().map(str::to_string);

    match complete_login(session, identity, &state.authorizer, preferred) {
        (LoginOutcome::Denied, _) => Err(AuthError::Unauthorized),
        (LoginOutcome::Redirect(target), session) => {
            let cookie = state.rotate_session(handle, session).await?;
            Ok(with_cookie(cookie, found(&target)))
        }
    }
}
