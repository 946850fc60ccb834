//! Command execution.
//!
//! Resolves the runtime configuration, dispatches to the packaging or docker
//! command and turns the outcome into an exit code.

mod docker;
mod package;

use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;

use docker::execute_docker;
use package::{Job, execute_package};

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    // Validate arguments
    if let Err(validation_error) = args.validate() {
        // Create output for validation errors (never quiet)
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::load(&args)?;

    let result = match Job::from_command(&args.command) {
        Job::Package {
            package,
            request,
            secrets,
        } => execute_package(package, &request, &secrets, &config).await,
        Job::Docker(docker) => execute_docker(docker, &config).await,
    };

    match result {
        Ok(()) => Ok(0),
        // the step printer already showed it
        Err(e) if e.is_reported() => Ok(1),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.indent(&format!("• {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}
