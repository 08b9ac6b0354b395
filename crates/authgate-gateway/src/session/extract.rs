//! Request-scoped session access.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use super::{Session, SessionId};
use crate::error::AuthError;
use crate::server::GatewayState;

/// Where a loaded session lives.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) fresh: bool,
}

impl SessionHandle {
    /// Handle for a session not yet known to the client.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: SessionId::generate(),
            fresh: true,
        }
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether the client still has to be given the cookie.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }
}

/// Extractor yielding the caller's session, or an empty one.
///
/// Nothing is persisted until the handler saves the session it returns.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// Storage handle.
    pub handle: SessionHandle,
    /// Session value.
    pub session: Session,
}

impl FromRequestParts<Arc<GatewayState>> for CurrentSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.load_session(&parts.headers).await?)
    }
}

/// Attach a `Set-Cookie` header when one was produced.
pub fn with_cookie(cookie: Option<HeaderValue>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
