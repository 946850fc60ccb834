//! Command line interface for pingnoo_deploy.
//!
//! This module provides argument parsing, command execution and the colored
//! step output every deployment run prints.

mod args;
pub mod commands;
mod docker;
mod output;

pub use args::{Args, Command, DockerArgs, PackageArgs, RuntimeConfig};
pub use commands::execute_command;
pub use output::{OutputManager, format_elapsed};

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose);
    execute_command(args).await
}

/// Initialise `env_logger`; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

/// Parse arguments without executing (for testing)
pub fn parse_args() -> Args {
    Args::parse_args()
}

/// Validate arguments without executing (for testing)
pub fn validate_args(args: &Args) -> std::result::Result<(), String> {
    args.validate()
}
