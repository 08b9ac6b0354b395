//! # authgate Core
//!
//! Core types, configuration, and authorization for authgate.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Normalized external identities returned by identity providers
//! - The allow-list authorizer that maps an identity to a principal
//! - Secret wrappers and config redaction for logging

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorize;
pub mod config;
pub mod identity;
pub mod secrets;

pub use authorize::{Authorizer, candidate_principals};
pub use config::{
    AppleConfig, Config, ConfigError, DEFAULT_CONFIG_FILE, DEFAULT_GATEWAY_URI, EmailConfig,
    LogFormat, OAuthCredentials, ServerConfig, SessionConfig, SmtpAuth, SmtpConfig, Upstream,
};
pub use identity::{ExternalIdentity, ProviderKind};
pub use secrets::{SecretString, redact_config};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::authorize::Authorizer;
    pub use crate::config::Config;
    pub use crate::identity::{ExternalIdentity, ProviderKind};
    pub use crate::secrets::SecretString;
}
