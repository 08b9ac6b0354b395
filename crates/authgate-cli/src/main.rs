//! web-auth-gateway CLI
//!
//! Command-line interface for the authgate session gateway.

#![forbid(unsafe_code)]

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use authgate_core::LogFormat;

/// authgate - Session gateway with OAuth2 and e-mail login
#[derive(Parser)]
#[command(name = "web-auth-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./.web-auth-gateway.json, then the user config dir)
    #[arg(short, long, global = true, env = "AUTHGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Validate the configuration and print a summary
    CheckConfig,

    /// Print the effective configuration with secrets redacted
    ShowConfig,

    /// Issue an e-mail login token and print the login link
    IssueToken {
        /// Address the token is issued for
        #[arg(short, long)]
        email: String,

        /// Where to land after login
        #[arg(long)]
        original_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        None => {
            commands::run_gateway(commands::RunArgs::default(), config, cli.verbose).await
        }
        Some(Commands::Run { port, host }) => {
            commands::run_gateway(commands::RunArgs { port, host }, config, cli.verbose).await
        }
        Some(Commands::CheckConfig) => commands::check_config(config),
        Some(Commands::ShowConfig) => commands::show_config(config),
        Some(Commands::IssueToken {
            email,
            original_url,
        }) => commands::issue_token(config, &email, original_url.as_deref()),
    }
}

/// Install the global tracing subscriber.
pub(crate) fn init_logging(format: LogFormat, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
