//! Out-of-band login token issuance.

use std::path::Path;

use anyhow::{Context, Result};

use authgate_core::Config;
use authgate_providers::EmailTokenSigner;

use crate::ui;

/// Issue a login token for `email` and print the link that consumes it.
pub fn issue_token(config_path: Option<&Path>, email: &str, original_url: Option<&str>) -> Result<()> {
    let config = Config::resolve(config_path).context("Failed to load configuration")?;
    let (token, link) = login_link(&config, email, original_url)?;

    ui::success(&format!("Login token issued for {email}"));
    ui::kv("Token", &token);
    ui::kv("Link", &link);
    Ok(())
}

fn login_link(config: &Config, email: &str, original_url: Option<&str>) -> Result<(String, String)> {
    let secret = config
        .token_signing_secret
        .as_ref()
        .context("tokenSigningSecret is not configured")?;
    let app_url = config
        .app_url
        .as_deref()
        .map(|url| url.trim_end_matches('/'))
        .context("appUrl must be configured to issue tokens")?;

    let token = EmailTokenSigner::new(secret.expose().as_bytes())
        .issue(email.trim(), original_url, app_url)
        .context("Failed to sign token")?;
    let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    let link = format!(
        "{app_url}{}/auth-token?token={encoded}",
        config.app_gateway_relative_uri
    );
    Ok((token, link))
}
