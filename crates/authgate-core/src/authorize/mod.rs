//! Allow-list authorization.
//!
//! An identity is turned into a list of candidate principal strings and
//! compared against the configured allow-list. Matching is exact and
//! case-sensitive; there are no wildcards.

use crate::identity::ExternalIdentity;

/// Derive candidate principals from an identity, in priority order.
///
/// Produces, skipping anything that would be empty:
/// 1. bare e-mail
/// 2. bare phone
/// 3. `email:<email>`
/// 4. `tel:<email>` (only when a phone is present)
/// 5. `<type>:<id>`
/// 6. `<type>:<login>`
///
/// Rule 4 pairs the `tel:` prefix with the e-mail value; the phone value is
/// deliberately not used there.
#[must_use]
pub fn candidate_principals(identity: &ExternalIdentity) -> Vec<String> {
    let email = non_empty(identity.email.as_deref());
    let phone = non_empty(identity.phone.as_deref());
    let kind = identity.kind.as_str();

    let mut candidates = Vec::with_capacity(6);
    if let Some(email) = email {
        candidates.push(email.to_string());
    }
    if let Some(phone) = phone {
        candidates.push(phone.to_string());
    }
    if let Some(email) = email {
        candidates.push(format!("email:{email}"));
    }
    if let (Some(_), Some(email)) = (phone, email) {
        candidates.push(format!("tel:{email}"));
    }
    if let Some(id) = non_empty(identity.id.as_deref()) {
        candidates.push(format!("{kind}:{id}"));
    }
    if let Some(login) = non_empty(identity.login.as_deref()) {
        candidates.push(format!("{kind}:{login}"));
    }
    candidates
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Flat principal allow-list.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    allowed: Vec<String>,
}

impl Authorizer {
    /// Create an authorizer over a list of allowed principals.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Authorize an identity.
    ///
    /// Rules are tried in configuration order; the first rule equal to any
    /// candidate wins. On success the matched candidate is written to
    /// `identity.principal` and returned. An empty allow-list denies all.
    pub fn authorize(&self, identity: &mut ExternalIdentity) -> Option<String> {
        let candidates = candidate_principals(identity);
        tracing::debug!(candidates = %candidates.join(","), "authorize");

        if self.allowed.is_empty() || candidates.is_empty() {
            return None;
        }

        let principal = self
            .allowed
            .iter()
            .find_map(|rule| candidates.iter().find(|c| *c == rule))?
            .clone();

        tracing::debug!(%principal, "matched principal");
        identity.principal = Some(principal.clone());
        Some(principal)
    }

    /// Whether any rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Get configured rules.
    #[must_use]
    pub fn rules(&self) -> &[String] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ProviderKind;
    use pretty_assertions::assert_eq;

    fn github_alice() -> ExternalIdentity {
        ExternalIdentity::new(ProviderKind::Github)
            .with_id("123")
            .with_login("alice")
    }

    #[test]
    fn test_candidates_order() {
        let identity = ExternalIdentity::new(ProviderKind::Google)
            .with_id("g-1")
            .with_login("bob")
            .with_email("bob@example.com")
            .with_phone("+4860000000");

        assert_eq!(
            candidate_principals(&identity),
            vec![
                "bob@example.com",
                "+4860000000",
                "email:bob@example.com",
                "tel:bob@example.com",
                "google:g-1",
                "google:bob",
            ]
        );
    }

    #[test]
    fn test_candidates_skip_empty_values() {
        let identity = ExternalIdentity::new(ProviderKind::Github)
            .with_id("")
            .with_login("alice")
            .with_email("");
        assert_eq!(candidate_principals(&identity), vec!["github:alice"]);
    }

    #[test]
    fn test_tel_candidate_needs_email() {
        let identity = ExternalIdentity::new(ProviderKind::Apple).with_phone("+100");
        assert_eq!(candidate_principals(&identity), vec!["+100"]);
    }

    #[test]
    fn test_email_not_matching_github_identity() {
        let authorizer = Authorizer::new(["alice@example.com"]);
        let mut identity = github_alice();

        assert_eq!(authorizer.authorize(&mut identity), None);
        assert_eq!(identity.principal, None);
    }

    #[test]
    fn test_github_login_rule() {
        let authorizer = Authorizer::new(["github:alice"]);
        let mut identity = github_alice();

        assert_eq!(
            authorizer.authorize(&mut identity).as_deref(),
            Some("github:alice")
        );
        assert_eq!(identity.principal.as_deref(), Some("github:alice"));
    }

    #[test]
    fn test_empty_allow_list_denies() {
        let authorizer = Authorizer::default();
        let mut identity = ExternalIdentity::from_email("a@example.com");
        assert!(authorizer.is_empty());
        assert_eq!(authorizer.authorize(&mut identity), None);
    }

    #[test]
    fn test_identity_without_candidates_denied() {
        let authorizer = Authorizer::new(["email:"]);
        let mut identity = ExternalIdentity::new(ProviderKind::Github);
        assert_eq!(authorizer.authorize(&mut identity), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let authorizer = Authorizer::new(["github:123", "alice@example.com"]);
        let mut identity = github_alice().with_email("alice@example.com");

        assert_eq!(
            authorizer.authorize(&mut identity).as_deref(),
            Some("github:123")
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let authorizer = Authorizer::new(["Alice@Example.com"]);
        let mut identity = ExternalIdentity::from_email("alice@example.com");
        assert_eq!(authorizer.authorize(&mut identity), None);
    }

    #[test]
    fn test_principal_is_a_candidate_and_a_rule() {
        let authorizer = Authorizer::new(["nobody", "email:carol@example.com"]);
        let mut identity = ExternalIdentity::from_email("carol@example.com");

        let principal = authorizer.authorize(&mut identity).unwrap();
        assert!(candidate_principals(&identity).contains(&principal));
        assert!(authorizer.rules().contains(&principal));
    }
}
