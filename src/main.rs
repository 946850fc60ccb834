//! Pingnoo Deploy - native installers and CI images for Pingnoo.

use pingnoo_deploy::cli;
use pingnoo_deploy::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            if !e.is_reported() {
                // never quiet for fatal errors
                let output = OutputManager::new(false, false);
                output.error(&format!("Fatal error: {e}"));

                let suggestions = e.recovery_suggestions();
                if !suggestions.is_empty() {
                    let _ = output.println("\n💡 Recovery suggestions:");
                    for suggestion in suggestions {
                        let _ = output.indent(&suggestion);
                    }
                }
            }

            process::exit(1);
        }
    }
}
