//! Secret handling.
//!
//! - `SecretString`: wrapper that prevents accidental logging
//! - `redact_config`: star out confidential fields before a config is logged

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Placeholder written in place of confidential values.
pub const REDACTED: &str = "***";

/// Key fragments that mark a config field as confidential.
pub const CONFIDENTIAL_KEYS: &[&str] = &[
    "authorization",
    "cookie",
    "password",
    "secret",
    "key",
    "token",
];

/// Secret string that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox`. Serializing yields
/// the redaction placeholder, never the value.
#[derive(Clone)]
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Expose the secret.
    ///
    /// Use sparingly - only when signing or sending to a vendor API.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Star out confidential fields of a JSON config tree.
///
/// Any field whose key contains one of [`CONFIDENTIAL_KEYS`]
/// (case-insensitive) is replaced, and URL values carrying a password
/// keep their user name but lose the password.
#[must_use]
pub fn redact_config(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let redacted = if is_confidential_key(key) && !val.is_object() {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_config(val)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_config).collect()),
        Value::String(s) => Value::String(redact_url_password(s)),
        other => other.clone(),
    }
}

fn is_confidential_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    CONFIDENTIAL_KEYS.iter().any(|k| key.contains(k))
}

fn redact_url_password(value: &str) -> String {
    let Ok(mut url) = url::Url::parse(value) else {
        return value.to_string();
    };
    if url.password().is_none() || url.set_password(Some(REDACTED)).is_err() {
        return value.to_string();
    }
    url.to_string()
}
