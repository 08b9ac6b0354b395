//! Configuration loading and validation.
//!
//! Configuration is a JSON5 document with camelCase keys. Lookup order:
//! an explicit path, `./.web-auth-gateway.json`, then
//! `<config dir>/web-auth-gateway/config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::ProviderKind;
use crate::secrets::{SecretString, redact_config};

/// Default relative URI under which the gateway serves its own routes.
pub const DEFAULT_GATEWAY_URI: &str = "/_auth-gateway";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".web-auth-gateway.json";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Principals allowed through the gateway.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Public application URL. Derived from the first request when absent.
    #[serde(default)]
    pub app_url: Option<String>,

    /// Title displayed on the login page.
    #[serde(default)]
    pub app_title: Option<String>,

    /// Support link displayed on gateway pages.
    #[serde(default)]
    pub support_link: Option<String>,

    /// Derive `appUrl` from the first request's `Host` header.
    #[serde(default = "default_true")]
    pub derive_app_url_from_headers: bool,

    /// When deriving `appUrl`, also trust `Forwarded`,
    /// `X-Forwarded-Host` and `X-Forwarded-Proto`.
    #[serde(default)]
    pub trust_forward_headers: bool,

    /// Relative URI of the gateway routes.
    #[serde(default = "default_gateway_uri")]
    pub app_gateway_relative_uri: String,

    /// GitHub OAuth app.
    #[serde(default)]
    pub github: Option<OAuthCredentials>,

    /// Google OAuth client.
    #[serde(default)]
    pub google: Option<OAuthCredentials>,

    /// Facebook app.
    #[serde(default)]
    pub facebook: Option<OAuthCredentials>,

    /// Microsoft identity platform app.
    #[serde(default)]
    pub microsoft: Option<OAuthCredentials>,

    /// Sign in with Apple (mobile identity tokens).
    #[serde(default)]
    pub apple: Option<AppleConfig>,

    /// E-mail sender for magic links.
    #[serde(default)]
    pub email: Option<EmailConfig>,

    /// HMAC secret used to sign e-mail login tokens.
    #[serde(default)]
    pub token_signing_secret: Option<SecretString>,

    /// Upstream: `file:<dir>`, `/abs/dir`, `http(s)://host` or absent.
    #[serde(default)]
    pub upstream: Option<String>,

    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Login e-mails allowed per address per minute.
    #[serde(default = "default_email_rate_limit")]
    pub email_rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_users: vec![],
            app_url: None,
            app_title: None,
            support_link: None,
            derive_app_url_from_headers: true,
            trust_forward_headers: false,
            app_gateway_relative_uri: default_gateway_uri(),
            github: None,
            google: None,
            facebook: None,
            microsoft: None,
            apple: None,
            email: None,
            token_signing_secret: None,
            upstream: None,
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            log_format: LogFormat::default(),
            email_rate_limit_per_minute: default_email_rate_limit(),
        }
    }
}

impl Config {
    /// Load configuration from the first default location that exists.
    ///
    /// Falls back to defaults when no file is found.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration from JSON5 text.
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be parsed or fails validation.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or the first default location that exists), apply
    /// environment overrides, then validate once.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the merged
    /// result fails validation.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| Self::default_paths().into_iter().find(|p| p.exists()));
        let config: Self = match path {
            Some(path) => json5::from_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Candidate config file paths, in lookup order.
    #[must_use]
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("web-auth-gateway").join("config.json"));
        }
        paths
    }

    /// Apply environment overrides.
    ///
    /// Recognized: `HOST`, `PORT`, `AUTHGATE_APP_URL`,
    /// `AUTHGATE_TOKEN_SIGNING_SECRET`, `AUTHGATE_UPSTREAM`.
    ///
    /// # Errors
    ///
    /// Returns error if an override is malformed or the result fails
    /// validation.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns error if an override is malformed or the result fails
    /// validation.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid PORT: {port}")))?;
        }
        if let Some(app_url) = lookup("AUTHGATE_APP_URL") {
            self.app_url = Some(app_url);
        }
        if let Some(secret) = lookup("AUTHGATE_TOKEN_SIGNING_SECRET") {
            self.token_signing_secret = Some(SecretString::new(secret));
        }
        if let Some(upstream) = lookup("AUTHGATE_UPSTREAM") {
            self.upstream = Some(upstream);
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        let uri = &self.app_gateway_relative_uri;
        if !uri.starts_with('/') || uri.len() < 2 || uri.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "appGatewayRelativeUri must look like '/path', got '{uri}'"
            )));
        }

        match &self.app_url {
            Some(app_url) => {
                let parsed = url::Url::parse(app_url).map_err(|e| {
                    ConfigError::Validation(format!("Invalid appUrl '{app_url}': {e}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Validation(format!(
                        "appUrl must be http or https, got '{app_url}'"
                    )));
                }
            }
            None if !self.derive_app_url_from_headers => {
                return Err(ConfigError::MissingField(
                    "appUrl (required when deriveAppUrlFromHeaders is false)".to_string(),
                ));
            }
            None => {}
        }

        for (kind, creds) in self.oauth_credentials() {
            if creds.client_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{kind} clientId cannot be empty"
                )));
            }
        }

        if let Some(apple) = &self.apple {
            if apple.audience.trim().is_empty() {
                return Err(ConfigError::MissingField(
                    "apple.audience (identity tokens for other apps would be accepted)"
                        .to_string(),
                ));
            }
        }

        match (&self.email, &self.token_signing_secret) {
            (Some(_), None) => {
                return Err(ConfigError::MissingField(
                    "tokenSigningSecret (required by email)".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingField(
                    "email (tokenSigningSecret is set but no email sender)".to_string(),
                ));
            }
            (Some(email), Some(secret)) => {
                if secret.is_empty() {
                    return Err(ConfigError::Validation(
                        "tokenSigningSecret cannot be empty".to_string(),
                    ));
                }
                if email.from_address.trim().is_empty() {
                    return Err(ConfigError::MissingField("email.fromAddress".to_string()));
                }
            }
            (None, None) => {}
        }

        if self.email_rate_limit_per_minute == 0 {
            return Err(ConfigError::Validation(
                "emailRateLimitPerMinute cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured OAuth vendors with their credentials.
    #[must_use]
    pub fn oauth_credentials(&self) -> Vec<(ProviderKind, &OAuthCredentials)> {
        [
            (ProviderKind::Facebook, self.facebook.as_ref()),
            (ProviderKind::Github, self.github.as_ref()),
            (ProviderKind::Google, self.google.as_ref()),
            (ProviderKind::Microsoft, self.microsoft.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, creds)| creds.map(|c| (kind, c)))
        .collect()
    }

    /// Whether the e-mail magic-link flow is enabled.
    #[must_use]
    pub const fn email_enabled(&self) -> bool {
        self.email.is_some() && self.token_signing_secret.is_some()
    }

    /// Parsed upstream target.
    #[must_use]
    pub fn upstream(&self) -> Upstream {
        Upstream::parse(self.upstream.as_deref())
    }

    /// The configuration as JSON with confidential fields starred out.
    #[must_use]
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::to_value(self).map_or(serde_json::Value::Null, |v| redact_config(&v))
    }
}

/// OAuth client credentials.
///
/// Accepts `appId` / `appSecret` as aliases for Facebook and Google style
/// configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCredentials {
    /// Client (application) id.
    #[serde(alias = "appId")]
    pub client_id: String,

    /// Client secret. Code exchange fails without it.
    #[serde(default, alias = "appSecret")]
    pub client_secret: Option<SecretString>,

    /// Base URL override for the vendor's API hosts.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl OAuthCredentials {
    /// Create credentials.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(SecretString::new(client_secret.into())),
            base_url: None,
        }
    }
}

/// Sign in with Apple settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleConfig {
    /// Expected `aud` of identity tokens (the app's bundle id).
    #[serde(default)]
    pub audience: String,

    /// JWKS endpoint override.
    #[serde(default)]
    pub jwks_url: Option<String>,
}

/// E-mail sender settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// `From:` address of login e-mails.
    pub from_address: String,

    /// SMTP relay. When absent, e-mails are written to the log instead.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    /// Relay host.
    pub host: String,

    /// Relay port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Credentials.
    #[serde(default)]
    pub auth: Option<SmtpAuth>,
}

/// SMTP credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpAuth {
    /// User name.
    pub user: String,

    /// Password.
    pub password: SecretString,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Cookie name.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Idle lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_secs: default_session_ttl(),
        }
    }
}

/// Where authenticated requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Serve files from a local directory.
    Static(PathBuf),
    /// Reverse proxy to an HTTP backend.
    Proxy(String),
    /// No upstream; answer with a debug message.
    Debug,
}

impl Upstream {
    /// Parse an upstream string.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Debug;
        };
        if let Some(dir) = value.strip_prefix("file://") {
            Self::Static(PathBuf::from(dir))
        } else if let Some(dir) = value.strip_prefix("file:") {
            Self::Static(PathBuf::from(dir))
        } else if value.starts_with('/') {
            Self::Static(PathBuf::from(value))
        } else if value.starts_with("http://") || value.starts_with("https://") {
            Self::Proxy(value.trim_end_matches('/').to_string())
        } else {
            Self::Debug
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

fn default_gateway_uri() -> String {
    DEFAULT_GATEWAY_URI.to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_cookie_name() -> String {
    "authgate.sid".to_string()
}

const fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

const fn default_email_rate_limit() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}
