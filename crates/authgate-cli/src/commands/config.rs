//! Configuration inspection commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use authgate_core::{Config, Upstream};

use crate::ui;

/// Validate the configuration and print what the gateway would run with.
pub fn check_config(config_path: Option<&Path>) -> Result<()> {
    let source = source_path(config_path);
    if source.is_none() {
        ui::info("No config file found, using defaults and environment");
    }
    let config = match Config::resolve(config_path) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("Configuration is invalid: {e}"));
            return Err(e.into());
        }
    };

    ui::header("Configuration");
    ui::kv(
        "Source",
        &source.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string()),
    );
    ui::kv(
        "App URL",
        config.app_url.as_deref().unwrap_or("(derived from request)"),
    );
    ui::kv("Gateway URI", &config.app_gateway_relative_uri);
    ui::kv("Upstream", &describe_upstream(&config.upstream()));
    ui::kv(
        "Listen",
        &format!("{}:{}", config.server.host, config.server.port),
    );

    ui::header("Login methods");
    let providers: Vec<String> = config
        .oauth_credentials()
        .into_iter()
        .map(|(kind, _)| kind.display_name().to_string())
        .collect();
    for name in &providers {
        ui::item(name);
    }
    if config.apple.is_some() {
        ui::item("Apple (mobile only)");
    }
    if config.email_enabled() {
        ui::item("E-mail magic link");
    }
    println!();

    for warning in warnings(&config, providers.is_empty()) {
        ui::warning(&warning);
    }
    ui::success(&format!(
        "Configuration is valid ({} allowed users)",
        config.allowed_users.len()
    ));
    Ok(())
}

/// Print the effective configuration with confidential values starred out.
pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::resolve(config_path).context("Failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn source_path(config_path: Option<&Path>) -> Option<PathBuf> {
    config_path
        .map(Path::to_path_buf)
        .or_else(|| Config::default_paths().into_iter().find(|p| p.exists()))
}

fn describe_upstream(upstream: &Upstream) -> String {
    match upstream {
        Upstream::Static(dir) => format!("files in {}", dir.display()),
        Upstream::Proxy(url) => format!("proxy to {url}"),
        Upstream::Debug => "none (debug responses)".to_string(),
    }
}

fn warnings(config: &Config, no_oauth: bool) -> Vec<String> {
    let mut out = Vec::new();
    if config.allowed_users.is_empty() {
        out.push("allowedUsers is empty, every login will be denied".to_string());
    }
    if no_oauth && config.apple.is_none() && !config.email_enabled() {
        out.push("No login method is configured".to_string());
    }
    if config.app_url.is_none() && config.trust_forward_headers {
        out.push(
            "appUrl is derived from forwarded headers; only enable this behind a trusted proxy"
                .to_string(),
        );
    }
    if matches!(config.upstream(), Upstream::Debug) {
        out.push("No upstream configured, authenticated requests get debug responses".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_upstream() {
        assert_eq!(
            describe_upstream(&Upstream::Proxy("http://backend:8080".to_string())),
            "proxy to http://backend:8080"
        );
        assert_eq!(
            describe_upstream(&Upstream::Static(PathBuf::from("/srv/www"))),
            "files in /srv/www"
        );
    }

    #[test]
    fn test_warnings_for_default_config() {
        let warnings = warnings(&Config::default(), true);
        assert!(warnings.iter().any(|w| w.contains("allowedUsers")));
        assert!(warnings.iter().any(|w| w.contains("No login method")));
        assert!(warnings.iter().any(|w| w.contains("No upstream")));
    }

    #[test]
    fn test_no_warnings_for_complete_config() {
        let config = Config::from_json5(
            r#"{
                appUrl: "https://app.example.com",
                allowedUsers: ["github:1"],
                github: { clientId: "id", clientSecret: "secret" },
                upstream: "http://backend:8080",
            }"#,
        )
        .unwrap();
        assert!(warnings(&config, false).is_empty());
    }

    #[test]
    fn test_explicit_source_path() {
        let path = PathBuf::from("/etc/gateway.json5");
        assert_eq!(source_path(Some(&path)), Some(path));
    }
}
