//! Windows installer bundler (Advanced Installer).
//!
//! # Process
//!
//! 1. Locates `curl` and `windeployqt`, downloading SmartCardTools when a
//!    certificate is given and no signer is present
//! 2. Copies every `.exe` and `.dll` from `bin\<arch>\<Type>` into
//!    `bin\<arch>\Deploy`, keeping the directory tree
//! 3. Signs the copied binaries and runs `windeployqt`
//! 4. Builds `installer\PingnooBuild.aip` (a copy of `Pingnoo.aip`) with the
//!    installer version and package name set, then signs the installer

use super::sign::{self, Signer};
use crate::bundler::{
    BundledArtifact, Bundler, PackageType,
    error::{Error, ErrorExt, Result},
    executor::CommandRunner,
    settings::Settings,
    staging::{PendingArtifact, StagingTree},
    tools,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions copied into the deployment tree.
const DEPLOYED_EXTENSIONS: &[&str] = &["exe", "dll"];

/// Options for the `windows` subcommand.
#[derive(Debug, Clone, Default)]
pub struct WindowsOptions {
    /// Qt installation directory
    pub qtdir: Option<PathBuf>,
    /// curl executable
    pub curl: Option<PathBuf>,
    /// Signing tool; defaults to ScSignTool in `tools/`
    pub signtool: Option<PathBuf>,
    /// Authenticode timestamp server; defaults to the product setting
    pub timeserver: Option<String>,
    /// Smartcard PIN for the signing certificate
    pub pin: Option<String>,
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Binaries copied into the deployment tree.
#[derive(Debug, Default)]
struct DeployedBinaries {
    /// Every copied file, signed when a certificate is given
    all: Vec<PathBuf>,
    /// Files at the top of the tree, handed to windeployqt
    top_level: Vec<PathBuf>,
}

async fn stage_binaries(settings: &Settings) -> Result<(StagingTree, DeployedBinaries)> {
    let build_dir = settings.build_dir();
    let staging = StagingTree::recreate(settings.deploy_dir()).await?;
    let mut binaries = DeployedBinaries::default();

    for entry in WalkDir::new(&build_dir).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(&build_dir)?;
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(staging.join(rel))
                .await
                .fs_context("creating directory", staging.join(rel))?;
            continue;
        }
        let deployed = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DEPLOYED_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if !deployed {
            continue;
        }

        let dest = staging.copy_file(entry.path(), rel).await?;
        if entry.depth() == 1 {
            binaries.top_level.push(dest.clone());
        }
        binaries.all.push(dest);
    }

    if binaries.top_level.is_empty() {
        return Err(Error::GenericError("no files could be found to deploy.".to_string()));
    }
    Ok((staging, binaries))
}

/// Resolve the signer, downloading SmartCardTools to its default location if needed.
async fn prepare_signer<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &WindowsOptions,
    cert: &str,
    curl: &Path,
) -> Result<Signer> {
    let settings = bundler.settings();
    let signtool = settings.resolve(
        options
            .signtool
            .clone()
            .unwrap_or_else(|| PathBuf::from(sign::DEFAULT_SIGNTOOL)),
    );

    if !signtool.is_file() {
        bundler
            .step(
                "Downloading SmartCardTools",
                sign::download_smartcardtools(
                    bundler.runner(),
                    curl,
                    &settings.tools_dir().join("smartcardtools"),
                ),
            )
            .await?;
    }

    let timeserver = options
        .timeserver
        .clone()
        .unwrap_or_else(|| settings.product().timeserver.clone());
    Ok(Signer::new(signtool, cert, timeserver).pin(options.pin.clone()))
}

/// Bundle the project as a Windows installer.
pub async fn bundle_project<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &WindowsOptions,
) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();

    let curl = bundler
        .step("Checking for curl", async {
            tools::find_tool("curl", options.curl.as_deref(), "--curlbin")
        })
        .await?;

    let windeployqt = bundler
        .step("Checking for windeployqt", async {
            let in_qt = options
                .qtdir
                .as_ref()
                .map(|dir| dir.join("bin").join(exe("windeployqt")));
            tools::find_tool("windeployqt", in_qt.as_deref(), "--qtdir")
        })
        .await?;

    let signer = match settings.certificate() {
        Some(cert) => Some(prepare_signer(bundler, options, cert, &curl).await?),
        None => None,
    };

    let (staging, binaries) = bundler
        .step("Setting up deployment directory", stage_binaries(settings))
        .await?;

    if let Some(signer) = &signer {
        bundler
            .step("Signing binaries", async {
                for file in &binaries.all {
                    signer.sign(runner, file).await?;
                }
                Ok(())
            })
            .await?;
    }

    let files = binaries
        .top_level
        .iter()
        .map(|f| format!("\"{}\"", f.display()))
        .collect::<Vec<_>>()
        .join(" ");
    bundler
        .step(
            "Running windeployqt",
            runner.checked(
                &format!(
                    "\"{}\" --dir \"{}\" {}",
                    windeployqt.display(),
                    staging.path().display(),
                    files
                ),
                "there was a problem running windeployqt.",
            ),
        )
        .await?;

    let installer_dir = settings.resolve(&product.installer_dir);
    let project = installer_dir.join(format!("{}Build.aip", product.name));
    let pending = PendingArtifact::new(
        &settings.deployment_dir(),
        &format!(
            "{} Setup [{}] ({}).exe",
            product.name,
            settings.version(),
            settings.arch()
        ),
    )?;
    let package_name = pending
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    bundler
        .step("Creating installer", async {
            let template = installer_dir.join(format!("{}.aip", product.name));
            tokio::fs::copy(&template, &project)
                .await
                .fs_context("copying installer project", &template)?;

            let fail = "there was a problem creating the installer.";
            let advinst = format!("AdvancedInstaller.com /edit \"{}\"", project.display());
            runner
                .checked(
                    &format!("{advinst} /SetVersion {}", settings.version().installer_version()),
                    fail,
                )
                .await?;
            runner
                .checked(
                    &format!("{advinst} /SetPackageName \"{package_name}\" -buildname MsiBuild"),
                    fail,
                )
                .await?;
            runner
                .checked(
                    &format!("AdvancedInstaller.com /build \"{}\"", project.display()),
                    fail,
                )
                .await
        })
        .await?;

    if let Some(signer) = &signer {
        bundler
            .step("Signing installer", signer.sign(runner, pending.path()))
            .await?;
    }

    bundler
        .step(
            "Moving installer into place",
            pending.persist(PackageType::WindowsInstaller),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{SettingsBuilder, executor::scripted::ScriptedRunner};
    use crate::cli::OutputManager;
    use crate::version::ProductVersion;

    fn write(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn project(root: &Path, cert: Option<&str>) -> (Settings, WindowsOptions) {
        let build = root.join("bin/x86_64/Release");
        write(&build.join("Pingnoo.exe"));
        write(&build.join("Ribbon.dll"));
        write(&build.join("Components/Core.dll"));
        write(&build.join("Pingnoo.pdb"));
        write(&root.join("installer/Pingnoo.aip"));
        write(&root.join("Qt/bin").join(exe("windeployqt")));
        write(&root.join("bin-tools/curl"));

        let settings = SettingsBuilder::new()
            .root(root)
            .version(ProductVersion::parse("2021.03.15-R3").unwrap())
            .certificate(cert.map(String::from))
            .build()
            .unwrap();
        let options = WindowsOptions {
            qtdir: Some(root.join("Qt")),
            curl: Some(root.join("bin-tools/curl")),
            ..Default::default()
        };
        (settings, options)
    }

    fn runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .respond_always("sign /n", 0, "Successfully signed\n")
            .respond("--dir", 0, "")
            .respond_always("AdvancedInstaller.com", 0, "")
    }

    #[tokio::test]
    async fn builds_unsigned_installer() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, options) = project(dir.path(), None);
        let runner = runner();
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        let artifact = bundle_project(&bundler, &options).await.unwrap();
        assert_eq!(
            artifact.paths,
            vec![dir.path().join("deployment/Pingnoo Setup [2021.03.15-R3] (x86_64).exe")]
        );

        let deploy = dir.path().join("bin/x86_64/Deploy");
        assert!(deploy.join("Components/Core.dll").is_file());
        assert!(!deploy.join("Pingnoo.pdb").exists());
        assert!(dir.path().join("installer/PingnooBuild.aip").is_file());

        let commands = runner.commands();
        let windeployqt = commands.iter().find(|c| c.contains("--dir")).unwrap();
        assert!(windeployqt.contains("Pingnoo.exe"));
        assert!(windeployqt.contains("Ribbon.dll"));
        assert!(!windeployqt.contains("Core.dll"));
        assert!(commands.iter().any(|c| c.ends_with("/SetVersion 21.03.15")));
        assert_eq!(runner.count("sign /n"), 0);
    }

    #[tokio::test]
    async fn signs_every_binary_and_the_installer() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, mut options) = project(dir.path(), Some("Open Source Developer"));
        write(&dir.path().join("signer/ScSignTool.exe"));
        options.signtool = Some(dir.path().join("signer/ScSignTool.exe"));
        options.pin = Some("123456".into());

        let runner = runner();
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        bundle_project(&bundler, &options).await.unwrap();

        assert_eq!(runner.count("-pin 123456 sign /n \"Open Source Developer\""), 4);
        assert_eq!(runner.count("/t http://time.certum.pl/"), 4);
        assert_eq!(runner.count("smartcardtools.zip"), 0);
        let last = runner.commands().pop().unwrap();
        assert!(last.contains(".partial-"));
    }

    #[tokio::test]
    async fn empty_build_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, options) = project(dir.path(), None);
        std::fs::remove_file(dir.path().join("bin/x86_64/Release/Pingnoo.exe")).unwrap();
        std::fs::remove_file(dir.path().join("bin/x86_64/Release/Ribbon.dll")).unwrap();
        let runner = runner();
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        let err = bundle_project(&bundler, &options).await.unwrap_err();
        assert!(err.to_string().contains("no files could be found to deploy."));
        assert_eq!(runner.count("--dir"), 0);
    }
}
