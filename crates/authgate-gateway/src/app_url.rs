//! Public application URL.
//!
//! An explicit `appUrl` always wins. Otherwise the URL is derived from the
//! first request that needs it and fixed for the life of the process.
//!
//! `Forwarded`, `X-Forwarded-Host` and `X-Forwarded-Proto` are client
//! controlled unless a proxy in front of the gateway rewrites them, so they
//! are only read when `trustForwardHeaders` is set.

use std::sync::OnceLock;

use axum::http::HeaderMap;
use axum::http::header::{FORWARDED, HOST};
use tracing::info;

use authgate_core::Config;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Resolver for the public application URL.
#[derive(Debug)]
pub struct AppUrl {
    configured: Option<String>,
    derive_from_headers: bool,
    trust_forward_headers: bool,
    derived: OnceLock<String>,
}

impl AppUrl {
    /// Create from config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            configured: config
                .app_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            derive_from_headers: config.derive_app_url_from_headers,
            trust_forward_headers: config.trust_forward_headers,
            derived: OnceLock::new(),
        }
    }

    /// The URL if already known.
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.configured
            .as_deref()
            .or_else(|| self.derived.get().map(String::as_str))
    }

    /// The URL, deriving it from `headers` on first use.
    ///
    /// `None` only when no `appUrl` is configured and derivation is off.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<&str> {
        if let Some(url) = &self.configured {
            return Some(url);
        }
        if !self.derive_from_headers {
            return None;
        }
        Some(self.derived.get_or_init(|| {
            let url = derive_from_headers(headers, self.trust_forward_headers);
            info!(app_url = %url, "derived app URL from request headers");
            url
        }))
    }

    /// Whether cookies should carry `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.get().is_some_and(|url| url.starts_with("https://"))
    }
}

/// Build `proto://host` from request headers.
#[must_use]
pub fn derive_from_headers(headers: &HeaderMap, trust_forward_headers: bool) -> String {
    let mut host = header_str(headers, HOST.as_str()).map(str::to_string);
    let mut proto = "http".to_string();

    if trust_forward_headers {
        if headers.contains_key(FORWARDED) {
            for value in headers.get_all(FORWARDED).iter() {
                let Ok(value) = value.to_str() else { continue };
                for pair in value.split([',', ';']) {
                    let Some((name, value)) = pair.split_once('=') else {
                        continue;
                    };
                    let value = value.trim().trim_matches('"');
                    if value.is_empty() {
                        continue;
                    }
                    match name.trim().to_ascii_lowercase().as_str() {
                        "host" => host = Some(value.to_string()),
                        "proto" => proto = value.to_ascii_lowercase(),
                        _ => {}
                    }
                }
            }
        } else {
            if let Some(value) = header_str(headers, X_FORWARDED_HOST) {
                host = Some(value.to_string());
            }
            if let Some(value) = header_str(headers, X_FORWARDED_PROTO) {
                proto = value.to_ascii_lowercase();
            }
        }
    }

    match host {
        Some(host) => format!("{proto}://{host}"),
        None => "http://localhost".to_string(),
    }
}

/// First value of a possibly repeated, comma-separated header.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_host_only() {
        let h = headers(&[("host", "app.example.com:8080")]);
        assert_eq!(derive_from_headers(&h, false), "http://app.example.com:8080");
    }

    #[test]
    fn test_forward_headers_ignored_unless_trusted() {
        let h = headers(&[
            ("host", "internal:3000"),
            ("x-forwarded-host", "evil.example.com"),
            ("x-forwarded-proto", "https"),
        ]);
        assert_eq!(derive_from_headers(&h, false), "http://internal:3000");
        assert_eq!(derive_from_headers(&h, true), "https://evil.example.com");
    }

    #[test]
    fn test_forwarded_header() {
        let h = headers(&[
            ("host", "internal:3000"),
            ("forwarded", "for=1.2.3.4;proto=https;host=\"app.example.com\""),
        ]);
        assert_eq!(derive_from_headers(&h, true), "https://app.example.com");
    }

    #[test]
    fn test_no_host_falls_back_to_localhost() {
        assert_eq!(derive_from_headers(&HeaderMap::new(), false), "http://localhost");
    }

    #[test]
    fn test_configured_url_wins() {
        let mut config = Config::default();
        config.app_url = Some("https://app.example.com/".to_string());
        let app_url = AppUrl::from_config(&config);

        let h = headers(&[("host", "other")]);
        assert_eq!(app_url.resolve(&h), Some("https://app.example.com"));
        assert!(app_url.is_https());
    }

    #[test]
    fn test_derived_once() {
        let app_url = AppUrl::from_config(&Config::default());
        assert_eq!(app_url.get(), None);

        assert_eq!(app_url.resolve(&headers(&[("host", "first")])), Some("http://first"));
        assert_eq!(app_url.resolve(&headers(&[("host", "second")])), Some("http://first"));
        assert_eq!(app_url.get(), Some("http://first"));
        assert!(!app_url.is_https());
    }

    #[test]
    fn test_derivation_disabled() {
        let mut config = Config::default();
        config.derive_app_url_from_headers = false;
        let app_url = AppUrl::from_config(&config);
        assert_eq!(app_url.resolve(&headers(&[("host", "x")])), None);
    }
}
