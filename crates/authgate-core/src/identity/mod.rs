//! External identities produced by identity providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity provider kind.
///
/// The serialized form doubles as the prefix of `<kind>:<id>` principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// GitHub OAuth2.
    Github,
    /// Google OAuth2 / OpenID Connect.
    Google,
    /// Facebook Login.
    Facebook,
    /// Microsoft identity platform.
    Microsoft,
    /// Sign in with Apple (mobile identity tokens only).
    Apple,
    /// E-mail magic link.
    Email,
}

impl ProviderKind {
    /// All OAuth-style kinds, in the order they are offered on the login page.
    pub const OAUTH: [Self; 5] = [
        Self::Facebook,
        Self::Github,
        Self::Google,
        Self::Microsoft,
        Self::Apple,
    ];

    /// Short name used in routes and principals.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Microsoft => "microsoft",
            Self::Apple => "apple",
            Self::Email => "email",
        }
    }

    /// Human readable vendor name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Github => "GitHub",
            Self::Google => "Google",
            Self::Facebook => "Facebook",
            Self::Microsoft => "Microsoft",
            Self::Apple => "Apple",
            Self::Email => "E-mail",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Self::Github),
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "microsoft" => Ok(Self::Microsoft),
            "apple" => Ok(Self::Apple),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Normalized result of a provider credential exchange.
///
/// `principal` is only ever written by [`crate::Authorizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider that vouched for this identity.
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// Provider-scoped subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Provider username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    /// E-mail address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Display name. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Canonical principal chosen by the authorizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
}

impl ExternalIdentity {
    /// Create an empty identity for a provider.
    #[must_use]
    pub const fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            id: None,
            login: None,
            email: None,
            phone: None,
            picture: None,
            name: None,
            principal: None,
        }
    }

    /// Identity vouched for by an e-mail magic link.
    #[must_use]
    pub fn from_email(email: impl Into<String>) -> Self {
        Self::new(ProviderKind::Email).with_email(email)
    }

    /// Set the subject identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the username.
    #[must_use]
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Set the e-mail address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the avatar URL.
    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    /// Whether the identity carries anything the authorizer can match on.
    #[must_use]
    pub const fn has_subject(&self) -> bool {
        self.id.is_some() || self.login.is_some() || self.email.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip_str() {
        for kind in ProviderKind::OAUTH {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("myspace".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_identity_serializes_type_field() {
        let identity = ExternalIdentity::new(ProviderKind::Github)
            .with_id("123")
            .with_login("alice");
        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(json["type"], "github");
        assert_eq!(json["login"], "alice");
        assert!(json.get("email").is_none());
        assert!(json.get("principal").is_none());
    }

    #[test]
    fn test_has_subject() {
        assert!(!ExternalIdentity::new(ProviderKind::Google).has_subject());
        assert!(
            !ExternalIdentity::new(ProviderKind::Google)
                .with_phone("+100")
                .has_subject()
        );
        assert!(ExternalIdentity::from_email("a@b.c").has_subject());
    }
}
