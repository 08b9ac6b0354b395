use tracing::{info, warn};

use authgate_core::{Authorizer, ExternalIdentity};

use crate::session::Session;

/// Result of authorizing a verified identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Logged in; send the browser here.
    Redirect(String),
    /// Identity not on the allow-list.
    Denied,
}

/// Authorize `identity` and, on success, record it in the session.
///
/// `preferred_target` (the e-mail token's embedded URL) beats the session's
/// pending original URL, which beats `/`. The pending URL is cleared on
/// success and kept on denial.
#[must_use]
pub fn complete_login(
    mut session: Session,
    mut identity: ExternalIdentity,
    authorizer: &Authorizer,
    preferred_target: Option<String>,
) -> (LoginOutcome, Session) {
    let Some(principal) = authorizer.authorize(&mut identity) else {
        warn!(
            kind = %identity.kind,
            login = identity.login.as_deref().unwrap_or_default(),
            email = identity.email.as_deref().unwrap_or_default(),
            "login denied"
        );
        return (LoginOutcome::Denied, session);
    };

    let pending = session.take_original_url();
    let target = safe_redirect_target(preferred_target.or(pending).as_deref());
    info!(principal = %principal, kind = %identity.kind, target = %target, "authenticated");

    session.authenticated_user = Some(identity);
    (LoginOutcome::Redirect(target), session)
}

/// Restrict post-login redirects to paths on this host.
#[must_use]
pub fn safe_redirect_target(target: Option<&str>) -> String {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.starts_with("/\\") => {
            t.to_string()
        }
        _ => "/".to_string(),
    }
}
