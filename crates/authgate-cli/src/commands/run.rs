//! Gateway run command.

use std::path::Path;

use anyhow::{Context, Result};

use authgate_core::Config;
use authgate_gateway::Gateway;

use crate::ui;

/// Run command arguments.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub host: Option<String>,
}

/// Load the configuration, install logging and serve until interrupted.
pub async fn run_gateway(args: RunArgs, config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let config = load(config_path, args)?;
    crate::init_logging(config.log_format, verbose);
    tracing::debug!(config = %config.redacted(), "effective configuration");

    ui::header("web-auth-gateway");
    ui::kv(
        "Listen",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    ui::kv(
        "App URL",
        config.app_url.as_deref().unwrap_or("(derived from request)"),
    );
    ui::kv("Gateway", &config.app_gateway_relative_uri);
    println!();

    let gateway = Gateway::new(config).context("Failed to build gateway")?;
    gateway.run().await.context("Gateway stopped with an error")?;
    Ok(())
}

fn load(config_path: Option<&Path>, args: RunArgs) -> Result<Config> {
    let mut config = Config::resolve(config_path).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
