//! AppImage bundler - portable Linux applications.
//!
//! # Process
//!
//! 1. Locates Qt (`--qtdir` or the `qmake` on `PATH`)
//! 2. Downloads linuxdeployqt and appimagetool into `tools/` when missing
//! 3. Stages the AppDir in `bin/<arch>/Deploy`
//! 4. Runs linuxdeployqt to pull in Qt and other non-system libraries
//! 5. Runs appimagetool to produce the AppImage, signed when `--cert` is set

use crate::bundler::{
    BundledArtifact, Bundler, PackageType,
    error::Result,
    executor::CommandRunner,
    settings::Settings,
    staging::{PendingArtifact, StagingTree},
    tools,
    utils::{fs as ufs, http},
};
use std::path::{Path, PathBuf};

/// SQL drivers whose client libraries are not bundled.
const EXCLUDED_LIBS: &str = "libqsqlodbc,libqsqlpsql";

/// Options for the `appimage` subcommand.
#[derive(Debug, Clone, Default)]
pub struct AppImageOptions {
    /// Qt installation directory
    pub qtdir: Option<PathBuf>,
    /// linuxdeployqt executable
    pub linuxdeployqt: Option<PathBuf>,
    /// appimagetool executable
    pub appimagetool: Option<PathBuf>,
}

/// Default location of a downloaded tool: `tools/<name>/<file name of url>`.
fn default_tool_path(settings: &Settings, name: &str, url: &str) -> PathBuf {
    let file = url.rsplit('/').next().unwrap_or(name);
    settings.tools_dir().join(name).join(file)
}

/// Use `requested` if it exists, otherwise download `url` to the default location.
async fn ensure_tool<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    name: &str,
    url: &str,
    requested: Option<&Path>,
) -> Result<PathBuf> {
    let default = default_tool_path(bundler.settings(), name, url);
    let path = requested.map(Path::to_path_buf).unwrap_or_else(|| default.clone());
    if path.is_file() {
        log::debug!("using {} at {}", name, path.display());
        return Ok(path);
    }

    bundler
        .step(&format!("Downloading {name}"), http::download_tool(url, &default))
        .await?;
    Ok(default)
}

/// Bundle the project as an AppImage.
pub async fn bundle_project<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &AppImageOptions,
) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();

    let qtdir = bundler
        .step("Checking qtdir", async { tools::find_qt(options.qtdir.as_deref()) })
        .await?;

    let linuxdeployqt = ensure_tool(
        bundler,
        "linuxdeployqt",
        &product.linuxdeployqt_url,
        options.linuxdeployqt.as_deref(),
    )
    .await?;
    let appimagetool = ensure_tool(
        bundler,
        "appimagetool",
        &product.appimagetool_url,
        options.appimagetool.as_deref(),
    )
    .await?;

    let desktop_rel = format!("usr/share/applications/{}.desktop", product.name);
    let staging = bundler
        .step("Setting up deployment directory", async {
            let build_dir = settings.build_dir();
            let installer_dir = settings.resolve(&product.installer_dir);
            let staging = StagingTree::recreate(settings.deploy_dir()).await?;

            staging.copy_into(&build_dir.join(&product.name), "usr/bin").await?;
            staging.copy_glob(&build_dir.join("*.so"), "usr/lib").await?;
            staging
                .copy_into(
                    &installer_dir.join(format!("{}.png", product.name)),
                    "usr/share/icons/hicolor/128x128/apps",
                )
                .await?;
            staging
                .copy_file(
                    &installer_dir.join(format!("{}.desktop", product.name)),
                    &desktop_rel,
                )
                .await?;
            let app_run = staging.copy_into(&installer_dir.join("AppRun"), "").await?;
            ufs::make_executable(&app_run).await?;
            staging.copy_tree(&build_dir.join("Components"), "Components").await?;
            Ok(staging)
        })
        .await?;

    bundler
        .step(
            "Running linuxdeployqt",
            runner.checked(
                &format!(
                    "\"{}\" \"{}\" -qmake=\"{}\" -bundle-non-qt-libs -exclude-libs={}",
                    linuxdeployqt.display(),
                    staging.join(&desktop_rel).display(),
                    qtdir.join("bin").join("qmake").display(),
                    EXCLUDED_LIBS
                ),
                "there was a problem running linuxdeployqt.",
            ),
        )
        .await?;

    let sign = match settings.certificate() {
        Some(cert) => format!("-s --sign-key={cert} "),
        None => String::new(),
    };
    let pending = PendingArtifact::new(
        &settings.deployment_dir(),
        &format!(
            "{} [{}] ({}).AppImage",
            product.name,
            settings.version(),
            settings.arch()
        ),
    )?;

    bundler
        .step(
            "Creating AppImage",
            runner.checked(
                &format!(
                    "\"{}\" -g {}\"{}\" \"{}\"",
                    appimagetool.display(),
                    sign,
                    staging.path().display(),
                    pending.path().display()
                ),
                "there was a problem creating the AppImage.",
            ),
        )
        .await?;

    bundler
        .step("Moving AppImage into place", async {
            ufs::make_executable(pending.path()).await?;
            pending.persist(PackageType::AppImage).await
        })
        .await
}
