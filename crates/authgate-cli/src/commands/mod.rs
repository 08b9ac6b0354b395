//! CLI command implementations.

pub mod config;
pub mod run;
pub mod token;

pub use config::{check_config, show_config};
pub use run::{RunArgs, run_gateway};
pub use token::issue_token;
