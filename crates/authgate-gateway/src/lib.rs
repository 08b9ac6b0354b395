//! # authgate Gateway
//!
//! Session-gated reverse proxy. Requests without an authenticated session
//! are sent to a login page; logins go through OAuth vendors or an e-mail
//! magic link and are checked against an allow-list before the session is
//! marked as authenticated.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Public application URL resolution.
pub mod app_url;
/// Credential exchange and login completion.
pub mod auth;
mod error;
/// Session gate middleware.
pub mod gate;
mod middleware;
/// HTML pages.
pub mod pages;
/// Gateway routes.
pub mod routes;
mod server;
/// Sessions and session storage.
pub mod session;
/// Upstream forwarding.
pub mod upstream;

pub use app_url::AppUrl;
pub use auth::{CallbackParams, LoginOutcome, authenticate, complete_login};
pub use error::AuthError;
pub use gate::AuthenticatedUser;
pub use middleware::EmailRateLimiter;
pub use server::{Gateway, GatewayBuilder, GatewayState};
pub use session::{MemorySessionStore, Session, SessionError, SessionId, SessionStore};

use authgate_core::Config;

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if the configuration is invalid or the server fails to
/// start.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
