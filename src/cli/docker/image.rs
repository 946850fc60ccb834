//! Building and pushing the CI Docker images.
//!
//! An image is a folder holding a `Dockerfile`. With `--all` the `-base` and
//! `-builder` variants of the folder are built too, in that order; variants
//! without a folder or a `Dockerfile` are skipped.

use crate::bundler::{
    CommandRunner, Error, Result,
    executor::in_dir,
};
use crate::cli::OutputManager;
use std::path::{Path, PathBuf};

/// Account the image's build user is created as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildAccount {
    /// Name and numeric id of the user
    pub user: Option<(String, u32)>,
    /// Name and numeric id of the group
    pub group: Option<(String, u32)>,
}

impl BuildAccount {
    /// `--build-arg` flags passing the account into the Dockerfile.
    pub fn build_args(&self) -> String {
        let mut args = String::new();
        if let Some((name, id)) = &self.user {
            args.push_str(&format!(
                "--build-arg DOCKER_USER={name} --build-arg DOCKER_USER_ID={id} "
            ));
        }
        if let Some((name, id)) = &self.group {
            args.push_str(&format!(
                "--build-arg DOCKER_GROUP={name} --build-arg DOCKER_GROUP_ID={id} "
            ));
        }
        args
    }
}

/// Numeric id of `user`.
#[cfg(unix)]
pub fn user_id(user: &str) -> Result<u32> {
    users::get_user_by_name(user)
        .map(|u| u.uid())
        .ok_or_else(|| Error::GenericError(format!("error finding the user id for user '{user}'.")))
}

/// Numeric id of `group`.
#[cfg(unix)]
pub fn group_id(group: &str) -> Result<u32> {
    users::get_group_by_name(group)
        .map(|g| g.gid())
        .ok_or_else(|| Error::GenericError(format!("error finding the group id for group '{group}'.")))
}

/// Numeric id of `user`.
#[cfg(not(unix))]
pub fn user_id(user: &str) -> Result<u32> {
    Err(Error::GenericError(format!(
        "user ids cannot be looked up on this platform (user '{user}')."
    )))
}

/// Numeric id of `group`.
#[cfg(not(unix))]
pub fn group_id(group: &str) -> Result<u32> {
    Err(Error::GenericError(format!(
        "group ids cannot be looked up on this platform (group '{group}')."
    )))
}

/// Resolve the build account for the given user and group names.
pub fn resolve_account(user: Option<&str>, group: Option<&str>) -> Result<BuildAccount> {
    Ok(BuildAccount {
        user: user.map(|u| user_id(u).map(|id| (u.to_string(), id))).transpose()?,
        group: group.map(|g| group_id(g).map(|id| (g.to_string(), id))).transpose()?,
    })
}

/// The image folders to build under `dir`, skipping ones without a Dockerfile.
pub fn buildable_images(dir: &Path, image: &str, all: bool) -> Vec<(String, PathBuf)> {
    let mut names = vec![image.to_string()];
    if all {
        names.push(format!("{image}-base"));
        names.push(format!("{image}-builder"));
    }

    names
        .into_iter()
        .filter_map(|name| {
            let folder = dir.join(&name);
            if folder.join("Dockerfile").is_file() {
                Some((name, folder))
            } else {
                log::debug!("skipping {}: no Dockerfile in {}", name, folder.display());
                None
            }
        })
        .collect()
}

/// Run one docker command as a step, keeping the step line intact when
/// docker's progress goes straight to the terminal.
async fn docker_step<R: CommandRunner>(
    runner: &R,
    output: &OutputManager,
    message: &str,
    command: &str,
    fail_msg: &str,
) -> Result<String> {
    let run = runner.checked(command, fail_msg);
    if runner.streams_output() {
        output.streamed_step(message, run).await
    } else {
        output.step(message, run).await
    }
}

/// Build every image folder, tag it under `registry` and push it.
///
/// Returns the tags that were pushed.
pub async fn build_and_push<R: CommandRunner>(
    runner: &R,
    output: &OutputManager,
    dir: &Path,
    image: &str,
    all: bool,
    registry: &str,
    account: &BuildAccount,
) -> Result<Vec<String>> {
    let images = buildable_images(dir, image, all);
    if images.is_empty() {
        return Err(Error::GenericError(format!(
            "no Dockerfile found for image '{}' in {}",
            image,
            dir.display()
        )));
    }

    let mut pushed = Vec::with_capacity(images.len());
    for (name, folder) in images {
        let tag = format!("{registry}/{name}");
        let build = in_dir(
            &folder,
            &format!("docker build -f Dockerfile {}-t {} .", account.build_args(), tag),
        );
        docker_step(
            runner,
            output,
            &format!("Building {name}"),
            &build,
            "error building docker image.",
        )
        .await?;
        docker_step(
            runner,
            output,
            &format!("Pushing {tag}"),
            &format!("docker push {tag}"),
            &format!("error pushing the docker image to '{registry}'."),
        )
        .await?;
        pushed.push(tag);
    }
    Ok(pushed)
}
