//! Locating external tools.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    executor::{CommandRunner, in_dir},
    utils::fs as ufs,
};
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// `qmake` found on `PATH`, looked up once per process.
static QMAKE_ON_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| match which::which("qmake") {
    Ok(path) => {
        log::debug!("Found qmake at: {}", path.display());
        Some(path)
    }
    Err(e) => {
        log::debug!("qmake not found in PATH: {}", e);
        None
    }
});

fn qmake_name() -> &'static str {
    if cfg!(windows) { "qmake.exe" } else { "qmake" }
}

/// Locate `name`, preferring an explicit override.
///
/// An override must name an existing file; it is never silently replaced by
/// a `PATH` lookup. `hint` tells the user how to fix a miss (usually the
/// flag that supplies the override).
pub fn find_tool(name: &str, override_path: Option<&Path>, hint: &str) -> Result<PathBuf> {
    let missing = || Error::ToolMissing {
        tool: name.to_string(),
        hint: hint.to_string(),
    };

    if let Some(path) = override_path {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(missing())
        };
    }

    which::which(name).map_err(|e| {
        log::debug!("{} not found in PATH: {}", name, e);
        missing()
    })
}

/// Qt installation directory (the one containing `bin/qmake`).
///
/// Uses `qtdir` when given, otherwise derives it from the `qmake` on `PATH`.
pub fn find_qt(qtdir: Option<&Path>) -> Result<PathBuf> {
    let missing = || Error::ToolMissing {
        tool: "qt directory".to_string(),
        hint: "--qtdir".to_string(),
    };

    if let Some(dir) = qtdir {
        return if dir.join("bin").join(qmake_name()).is_file() {
            Ok(dir.to_path_buf())
        } else {
            Err(missing())
        };
    }

    QMAKE_ON_PATH
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(missing)
}

/// Check that every `(tool, package)` pair is installed.
///
/// The first missing tool fails with the package that provides it.
pub fn check_prerequisites(tools: &[(&str, &str)]) -> Result<()> {
    for (tool, package) in tools {
        if which::which(tool).is_err() {
            return Err(Error::ToolMissing {
                tool: (*tool).to_string(),
                hint: format!("install the '{package}' package"),
            });
        }
        log::debug!("found prerequisite {}", tool);
    }
    Ok(())
}

/// Whether `tools/<name>/<executable>` is already present.
pub fn cloned_tool(tools_dir: &Path, name: &str, executable: &str) -> Option<PathBuf> {
    let path = tools_dir.join(name).join(executable);
    path.is_file().then_some(path)
}

/// Clone `repository` into `tools/<name>`, replacing a partial checkout.
///
/// Returns the path of `executable` inside the checkout, which must exist
/// once the clone finishes.
pub async fn clone_tool<R: CommandRunner>(
    runner: &R,
    tools_dir: &Path,
    name: &str,
    repository: &str,
    executable: &str,
) -> Result<PathBuf> {
    let checkout = tools_dir.join(name);
    ufs::remove_dir_all(&checkout).await?;
    tokio::fs::create_dir_all(tools_dir)
        .await
        .fs_context("creating directory", tools_dir)?;

    runner
        .checked(
            &in_dir(tools_dir, &format!("git clone {repository}")),
            &format!("unable to clone {name}."),
        )
        .await?;

    cloned_tool(tools_dir, name, executable).ok_or_else(|| Error::ToolMissing {
        tool: checkout.join(executable).display().to_string(),
        hint: repository.to_string(),
    })
}
