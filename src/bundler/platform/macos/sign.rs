//! macOS code signing with `codesign`.
//!
//! Everything is signed with the hardened runtime and a secure timestamp,
//! both of which notarization requires. Nested code has to be signed before
//! the bundle that contains it, so frameworks and dylibs go first.

use crate::bundler::{error::Result, executor::CommandRunner};
use std::path::{Path, PathBuf};

/// `codesign` invocation for one file or bundle.
pub fn codesign_command(cert: &str, path: &Path) -> String {
    format!(
        "codesign --verify --timestamp -o runtime --force --sign \"{}\" \"{}\"",
        cert,
        path.display()
    )
}

/// Sign a single file or bundle.
pub async fn sign_path<R: CommandRunner>(runner: &R, cert: &str, path: &Path) -> Result<()> {
    runner
        .checked(
            &codesign_command(cert, path),
            &format!("there was a problem signing a file ({}).", path.display()),
        )
        .await?;
    Ok(())
}

/// Nested code inside `app` in signing order: frameworks, then dylibs.
pub fn nested_code(app: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for extension in ["framework", "dylib"] {
        let pattern = app.join("**").join(format!("*.{extension}"));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            found.push(entry?);
        }
    }
    Ok(found)
}

/// Sign the nested code of `app` and then the bundle itself.
///
/// Returns the number of items signed.
pub async fn sign_app_bundle<R: CommandRunner>(runner: &R, cert: &str, app: &Path) -> Result<usize> {
    let nested = nested_code(app)?;
    for path in &nested {
        sign_path(runner, cert, path).await?;
    }
    sign_path(runner, cert, app).await?;

    log::debug!("signed {} with {} nested items", app.display(), nested.len());
    Ok(nested.len() + 1)
}
