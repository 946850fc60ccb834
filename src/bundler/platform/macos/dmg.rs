//! macOS DMG disk image bundler.
//!
//! # Process
//!
//! 1. Locates Qt and clones `create-dmg` into `tools/` when missing
//! 2. Copies `Pingnoo.app` into `bin/<arch>/Deploy` (merging both
//!    architectures with `makeuniversal` for universal builds)
//! 3. Runs `macdeployqt` and drops the SQL driver plugins that are not shipped
//! 4. Signs the bundle, zips it with `ditto`, notarizes and staples it
//! 5. Builds the DMG with `create-dmg`, then signs, notarizes and staples it
//! 6. Moves the DMG to `deployment/Pingnoo [<version>] (<arch>).dmg`
//!
//! `deployment/` itself is never cleared; only the finished image replaces a
//! previous one of the same name.

use super::{notarize::NotarizationPoller, sign, universal};
use crate::bundler::{
    Arch, BundledArtifact, Bundler, PackageType,
    error::{Error, ErrorExt, Result},
    executor::CommandRunner,
    settings::Settings,
    staging::{PendingArtifact, StagingTree},
    tools,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

const CREATE_DMG_REPOSITORY: &str = "https://github.com/andreyvit/create-dmg.git";

/// SQL driver plugins removed from the bundle after `macdeployqt`.
const UNUSED_PLUGINS: &[&str] = &["libqsqlodbc.dylib", "libqsqlpsql.dylib"];

/// Options for the `dmg` subcommand.
#[derive(Debug, Clone, Default)]
pub struct DmgOptions {
    /// Qt installation directory
    pub qtdir: Option<PathBuf>,
    /// Apple ID used for notarization
    pub apple_id: Option<String>,
    /// App specific password for the Apple ID
    pub password: Option<String>,
    /// Give up on a notarization request after this long; `None` uses the product default
    pub notarize_timeout: Option<Duration>,
}

/// Signing identity and notarization account, all of which are required.
struct Credentials<'a> {
    cert: &'a str,
    apple_id: &'a str,
    password: &'a str,
}

fn credentials<'a>(settings: &'a Settings, options: &'a DmgOptions) -> Result<Credentials<'a>> {
    let missing = |what: &str, flag: &str| Error::ToolMissing {
        tool: what.to_string(),
        hint: flag.to_string(),
    };
    Ok(Credentials {
        cert: settings
            .certificate()
            .ok_or_else(|| missing("signing certificate", "--cert"))?,
        apple_id: options
            .apple_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("apple id", "--appleid"))?,
        password: options
            .password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("apple id password", "--password"))?,
    })
}

/// Remove the unused SQL drivers from `app`, returning how many were present.
async fn remove_unused_plugins(app: &Path) -> Result<usize> {
    let drivers = app.join("Contents/PlugIns/sqldrivers");
    let mut removed = 0;
    for plugin in UNUSED_PLUGINS {
        let path = drivers.join(plugin);
        if path.is_file() {
            tokio::fs::remove_file(&path)
                .await
                .fs_context("removing plugin", &path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// `create-dmg` invocation laying out the app and an Applications link.
fn create_dmg_command(tool: &Path, settings: &Settings, background: &Path, dmg: &Path, app: &Path) -> String {
    let product = settings.product();
    format!(
        "\"{}\" --volname \"{}\" --background \"{}\" --window-size 768 534 --icon-size 160 \
         --icon {}.app 199 276 --app-drop-link 569 276 \"{}\" \"{}\"",
        tool.display(),
        product.name,
        background.display(),
        product.name,
        dmg.display(),
        app.display()
    )
}

/// Bundle the project as a signed and notarized DMG.
pub async fn bundle_project<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &DmgOptions,
) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();
    let app_name = format!("{}.app", product.name);

    let credentials = bundler
        .step("Checking signing credentials", async { credentials(settings, options) })
        .await?;

    let qtdir = bundler
        .step("Checking qtdir", async { tools::find_qt(options.qtdir.as_deref()) })
        .await?;

    let staging = bundler
        .step(
            "Setting up deployment directory",
            StagingTree::recreate(settings.deploy_dir()),
        )
        .await?;

    let tools_dir = settings.tools_dir();
    let create_dmg = match tools::cloned_tool(&tools_dir, "create-dmg", "create-dmg") {
        Some(path) => path,
        None => {
            bundler
                .step(
                    "Cloning create-dmg",
                    tools::clone_tool(runner, &tools_dir, "create-dmg", CREATE_DMG_REPOSITORY, "create-dmg"),
                )
                .await?
        }
    };

    let app = staging.join(&app_name);
    if settings.arch() == Arch::Universal {
        let makeuniversal = universal::ensure_makeuniversal(bundler, &qtdir).await?;
        universal::merge_app(bundler, &makeuniversal, &app_name, &app).await?;
    } else {
        bundler
            .step(
                "Copying application bundle",
                staging.copy_tree(&settings.build_dir().join(&app_name), &app_name),
            )
            .await?;
    }

    bundler
        .step(
            "Running macdeployqt",
            runner.checked(
                &format!(
                    "\"{}\" \"{}\" -no-strip",
                    qtdir.join("bin").join("macdeployqt").display(),
                    app.display()
                ),
                "there was a problem running macdeployqt.",
            ),
        )
        .await?;

    let removed = bundler
        .step("Removing unwanted qt plugins", remove_unused_plugins(&app))
        .await?;
    log::debug!("removed {} unused plugins", removed);

    bundler
        .step(
            "Signing binaries",
            sign::sign_app_bundle(runner, credentials.cert, &app),
        )
        .await?;

    let timeout = options
        .notarize_timeout
        .unwrap_or(Duration::from_secs(product.notarize_timeout_secs));
    let poller = NotarizationPoller::new(
        runner,
        credentials.apple_id,
        credentials.password,
        &product.bundle_id,
    )?
    .interval(Duration::from_secs(product.notarize_interval_secs))
    .timeout(Some(timeout));

    let zip = staging.join(format!("{}.zip", product.name));
    bundler
        .step(
            "Creating zip archive",
            runner.checked(
                &format!(
                    "ditto -ck --sequesterRsrc --keepParent \"{}\" \"{}\"",
                    app.display(),
                    zip.display()
                ),
                "there was a problem generating the application zip.",
            ),
        )
        .await?;

    bundler
        .step("Performing notarization of application binary", poller.notarize(&zip))
        .await?;
    bundler
        .step(
            "Stapling notarization ticket to binary",
            runner.checked(
                &format!("xcrun stapler staple \"{}\"", app.display()),
                "there was a problem stapling the ticket to application.",
            ),
        )
        .await?;

    let artwork = settings.resolve(&product.artwork_dir);
    let background = artwork.join("pingnoo_background.tiff");
    let dmg = staging.join(format!("{}.dmg", product.name));
    bundler
        .step("Creating installation dmg", async {
            runner
                .checked(
                    &format!(
                        "tiffutil -cat \"{}\" \"{}\" -out \"{}\"",
                        artwork.join("background.tiff").display(),
                        artwork.join("background@2x.tiff").display(),
                        background.display()
                    ),
                    "there was a problem creating the combined tiff.",
                )
                .await?;
            runner
                .checked(
                    &create_dmg_command(&create_dmg, settings, &background, &dmg, &app),
                    "there was a problem creating the dmg.",
                )
                .await
        })
        .await?;

    bundler
        .step(
            "Signing dmg",
            runner.checked(
                &sign::codesign_command(credentials.cert, &dmg),
                "there was a problem signing the dmg.",
            ),
        )
        .await?;
    bundler
        .step("Performing notarization of installation dmg", poller.notarize(&dmg))
        .await?;
    bundler
        .step(
            "Stapling notarization ticket to dmg",
            runner.checked(
                &format!("xcrun stapler staple \"{}\"", dmg.display()),
                "there was a problem stapling the ticket to dmg.",
            ),
        )
        .await?;

    let pending = PendingArtifact::new(
        &settings.deployment_dir(),
        &format!("{} [{}] ({}).dmg", product.name, settings.version(), settings.arch()),
    )?;
    bundler
        .step("Copying dmg to deployment directory", async {
            pending.fill_from(&dmg).await?;
            pending.persist(PackageType::Dmg).await
        })
        .await
}
