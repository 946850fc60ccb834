//! Docker command implementation.
//!
//! Builds the CI image folders and pushes them to the registry.

use crate::bundler::ShellRunner;
use crate::cli::docker::{build_and_push, resolve_account};
use crate::cli::{DockerArgs, RuntimeConfig};
use crate::error::Result;

/// Execute docker command
pub(super) async fn execute_docker(docker: &DockerArgs, config: &RuntimeConfig) -> Result<()> {
    let output = config.output();
    let registry = docker.registry.as_deref().unwrap_or(&config.product.registry);
    let dir = config.root.join(&docker.images_dir);

    output.start_banner(&format!("Docker image {}", docker.image));
    let started = std::time::Instant::now();

    let account = output
        .step("Resolving build account", async {
            resolve_account(docker.user.as_deref(), docker.group.as_deref())
        })
        .await?;

    // docker prints layer progress, so it talks to the terminal directly
    let runner = ShellRunner::new().inherit();
    let pushed = build_and_push(
        &runner,
        output,
        &dir,
        &docker.image,
        docker.all,
        registry,
        &account,
    )
    .await?;

    output.finished(&pushed.join(", "), started.elapsed());
    Ok(())
}
