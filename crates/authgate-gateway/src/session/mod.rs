//! Sessions.
//!
//! A [`Session`] is a plain value. Handlers load it, hand it to the
//! authentication core, get the updated value back and persist it
//! explicitly through a [`SessionStore`].

mod cookie;
mod extract;
mod store;

pub use cookie::{extract_session_id, session_cookie};
pub use extract::{CurrentSession, SessionHandle, with_cookie};
pub use store::{MemorySessionStore, SessionStore};

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use authgate_core::ExternalIdentity;

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Backend failure.
    #[error("Session storage error: {0}")]
    Storage(String),
}

/// Opaque session identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a random 256-bit identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse an identifier received from a client.
    ///
    /// Only well-formed identifiers are accepted.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        (value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| Self(value.to_ascii_lowercase()))
    }

    /// Identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-browser gateway state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Anti-CSRF nonce echoed back by OAuth vendors as `state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_state: Option<String>,

    /// Where to go once logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,

    /// Identity established by a successful login.
    #[serde(
        default,
        rename = "_authenticatedUser",
        skip_serializing_if = "Option::is_none"
    )]
    pub authenticated_user: Option<ExternalIdentity>,
}

impl Session {
    /// Anti-CSRF nonce, generated on first use and stable afterwards.
    pub fn ensure_auth_state(&mut self) -> &str {
        self.auth_state.get_or_insert_with(|| {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        })
    }

    /// Record the original URL unless one is already pending.
    ///
    /// Returns whether the session changed.
    pub fn remember_original_url(&mut self, url: impl Into<String>) -> bool {
        if self.original_url.is_some() {
            return false;
        }
        self.original_url = Some(url.into());
        true
    }

    /// Take and clear the pending original URL.
    pub fn take_original_url(&mut self) -> Option<String> {
        self.original_url.take()
    }

    /// Whether a login has completed in this session.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated_user.is_some()
    }
}
