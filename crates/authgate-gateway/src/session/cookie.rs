//! Session cookie helpers.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

use super::SessionId;

/// Build the `Set-Cookie` value for a session.
#[must_use]
pub fn session_cookie(name: &str, id: &SessionId, ttl_secs: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract the session id from the request's `Cookie` headers.
///
/// Malformed ids are ignored.
#[must_use]
pub fn extract_session_id(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == name {
                SessionId::parse(value)
            } else {
                None
            }
        })
}
