//! Upstream forwarding for authenticated requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use authgate_core::Upstream;

use crate::error::AuthError;
use crate::gate::AuthenticatedUser;
use crate::server::GatewayState;

/// Header carrying the authenticated principal to a proxied backend.
pub const X_FORWARDED_USER: HeaderName = HeaderName::from_static("x-forwarded-user");

/// Largest request body relayed to a proxied backend.
pub const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Resolved upstream.
pub enum UpstreamTarget {
    /// Static files.
    Static(ServeDir),
    /// Reverse proxy.
    Proxy {
        /// Backend base URL without trailing slash.
        base: String,
        /// Client used for forwarded requests.
        client: reqwest::Client,
    },
    /// Debug responder.
    Debug,
}

impl UpstreamTarget {
    /// Resolve the configured upstream.
    #[must_use]
    pub fn new(upstream: &Upstream) -> Self {
        match upstream {
            Upstream::Static(dir) => {
                info!(dir = %dir.display(), "upstream: local files");
                Self::Static(ServeDir::new(dir))
            }
            Upstream::Proxy(base) => {
                info!(url = %base, "upstream: reverse proxy");
                let client = reqwest::Client::builder()
                    .redirect(reqwest::redirect::Policy::none())
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .unwrap_or_default();
                Self::Proxy {
                    base: base.clone(),
                    client,
                }
            }
            Upstream::Debug => {
                info!("upstream: none, serving debug messages");
                Self::Debug
            }
        }
    }
}

/// Fallback handler: hand an authenticated request to the upstream.
pub async fn forward(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let Some(AuthenticatedUser(identity)) = request.extensions().get::<AuthenticatedUser>().cloned()
    else {
        return AuthError::NotFound.into_response();
    };
    let principal = identity.principal.unwrap_or_default();
    debug!(principal = %principal, method = %request.method(), uri = %request.uri(), "forwarding");

    match &state.upstream {
        UpstreamTarget::Static(dir) => match dir.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        UpstreamTarget::Proxy { base, client } => {
            let cookie_name = &state.config.session.cookie_name;
            proxy(client, base, request, &principal, cookie_name).await
        }
        UpstreamTarget::Debug => format!(
            "no upstream configured, you requested {} as {principal}",
            request.uri()
        )
        .into_response(),
    }
}

async fn proxy(
    client: &reqwest::Client,
    base: &str,
    request: Request,
    principal: &str,
    cookie_name: &str,
) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = format!("{base}{path_and_query}");

    let body = match axum::body::to_bytes(body, MAX_PROXY_BODY).await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "request body rejected");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    strip_cookie(&mut headers, cookie_name);
    headers.remove(X_FORWARDED_USER);
    if let Ok(value) = HeaderValue::from_str(principal) {
        headers.insert(X_FORWARDED_USER, value);
    }

    let result = client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match result {
        Ok(upstream) => {
            let status = upstream.status();
            let mut headers = upstream.headers().clone();
            strip_hop_by_hop(&mut headers);
            let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(err) => {
            warn!(error = %err, url = %url, "upstream error");
            (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Drop the gateway's own cookie so the session id never reaches the backend.
fn strip_cookie(headers: &mut HeaderMap, name: &str) {
    let kept: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| {
            !pair.is_empty() && pair.split_once('=').map_or(*pair, |(key, _)| key.trim()) != name
        })
        .map(str::to_string)
        .collect();

    headers.remove(header::COOKIE);
    if kept.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&kept.join("; ")) {
        headers.insert(header::COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        strip_hop_by_hop(&mut headers);
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_strip_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; authgate.sid=abc123"),
        );
        headers.append(header::COOKIE, HeaderValue::from_static("lang=en"));
        strip_cookie(&mut headers, "authgate.sid");
        assert_eq!(headers[header::COOKIE], "theme=dark; lang=en");

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("authgate.sid=abc123"));
        strip_cookie(&mut headers, "authgate.sid");
        assert!(!headers.contains_key(header::COOKIE));
    }

    #[test]
    fn test_target_resolution() {
        assert!(matches!(
            UpstreamTarget::new(&Upstream::Static(PathBuf::from("/srv"))),
            UpstreamTarget::Static(_)
        ));
        assert!(matches!(
            UpstreamTarget::new(&Upstream::Proxy("http://backend".to_string())),
            UpstreamTarget::Proxy { .. }
        ));
        assert!(matches!(
            UpstreamTarget::new(&Upstream::Debug),
            UpstreamTarget::Debug
        ));
    }
}
