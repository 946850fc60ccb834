//! Packaging commands (`deb`, `rpm`, `pkg`, `appimage`, `dmg`, `windows`).

use crate::bundler::{
    AppImageOptions, BundleRequest, Bundler, DebOptions, DmgOptions, RpmOptions, Settings,
    SettingsBuilder, ShellRunner, WindowsOptions,
};
use crate::cli::{Command, DockerArgs, PackageArgs, RuntimeConfig};
use crate::error::Result;
use crate::version::ProductVersion;
use std::time::{Duration, Instant};

/// What a parsed subcommand asks for.
#[derive(Debug)]
pub(super) enum Job<'a> {
    /// Build one package.
    Package {
        package: &'a PackageArgs,
        request: BundleRequest,
        /// Values that must never appear in logged command lines
        secrets: Vec<String>,
    },
    /// Build and push CI images.
    Docker(&'a DockerArgs),
}

impl<'a> Job<'a> {
    pub(super) fn from_command(command: &'a Command) -> Self {
        let (package, request, secrets) = match command {
            Command::Deb { package, output } => (
                package,
                BundleRequest::Deb(DebOptions {
                    output: output.clone(),
                }),
                Vec::new(),
            ),
            Command::Rpm { package, release } => (
                package,
                BundleRequest::Rpm(RpmOptions {
                    release: release.clone(),
                }),
                Vec::new(),
            ),
            Command::Pkg { package } => (package, BundleRequest::Pkg, Vec::new()),
            Command::AppImage {
                package,
                qtdir,
                linuxdeployqt,
                appimagetool,
            } => (
                package,
                BundleRequest::AppImage(AppImageOptions {
                    qtdir: qtdir.clone(),
                    linuxdeployqt: linuxdeployqt.clone(),
                    appimagetool: appimagetool.clone(),
                }),
                Vec::new(),
            ),
            Command::Dmg {
                package,
                qtdir,
                apple_id,
                password,
                notarize_timeout,
            } => (
                package,
                BundleRequest::Dmg(DmgOptions {
                    qtdir: qtdir.clone(),
                    apple_id: apple_id.clone(),
                    password: password.clone(),
                    notarize_timeout: notarize_timeout.map(Duration::from_secs),
                }),
                password.iter().cloned().collect(),
            ),
            Command::Windows {
                package,
                qtdir,
                curl,
                signtool,
                timeserver,
                pin,
            } => (
                package,
                BundleRequest::Windows(WindowsOptions {
                    qtdir: qtdir.clone(),
                    curl: curl.clone(),
                    signtool: signtool.clone(),
                    timeserver: timeserver.clone(),
                    pin: pin.clone(),
                }),
                pin.iter().cloned().collect(),
            ),
            Command::Docker(docker) => return Job::Docker(docker),
        };
        Job::Package {
            package,
            request,
            secrets,
        }
    }
}

pub(super) fn create_settings(package: &PackageArgs, config: &RuntimeConfig) -> Result<Settings> {
    let version = ProductVersion::parse(&package.version)?;
    Ok(SettingsBuilder::new()
        .root(&config.root)
        .arch(package.arch)
        .build_type(package.build_type)
        .version(version)
        .signing_key(package.key.clone())
        .certificate(package.cert.clone())
        .product(config.product.clone())
        .build()?)
}

/// Execute a packaging command
pub(super) async fn execute_package(
    package: &PackageArgs,
    request: &BundleRequest,
    secrets: &[String],
    config: &RuntimeConfig,
) -> Result<()> {
    let settings = create_settings(package, config)?;
    let runner = secrets
        .iter()
        .cloned()
        .fold(ShellRunner::new(), ShellRunner::redacting);
    let output = config.output();

    output.start_banner(&format!(
        "{} {} ({}, {})",
        settings.product().name,
        request.package_type(),
        settings.arch(),
        settings.version()
    ));
    let started = Instant::now();

    let bundler = Bundler::new(&settings, &runner, output);
    let artifact = bundler.bundle(request).await?;

    let location = artifact
        .paths
        .first()
        .map(|path| format!("{} at \"{}\"", request.package_type(), path.display()))
        .unwrap_or_else(|| request.package_type().to_string());
    let _ = output.detail(&format!(
        "{} bytes, sha256 {}",
        artifact.size, artifact.checksum
    ));
    output.finished(&location, started.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Arch, BuildType, PackageType, ProductSettings};
    use crate::cli::{Args, OutputManager};
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pingnoo_deploy").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn dmg_request_carries_notarization_options() {
        let args = args(&[
            "dmg",
            "--version",
            "2021.03.15-R3",
            "--appleid",
            "dev@example.com",
            "--password",
            "secret",
            "--notarize-timeout",
            "600",
        ]);
        match Job::from_command(&args.command) {
            Job::Package {
                request: BundleRequest::Dmg(options),
                secrets,
                ..
            } => {
                assert_eq!(options.apple_id.as_deref(), Some("dev@example.com"));
                assert_eq!(options.notarize_timeout, Some(Duration::from_secs(600)));
                assert_eq!(secrets, vec!["secret".to_string()]);
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn docker_is_not_a_bundle() {
        let args = args(&["docker", "fedora-33"]);
        match Job::from_command(&args.command) {
            Job::Docker(docker) => assert_eq!(docker.image, "fedora-33"),
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn settings_follow_flags() {
        let args = args(&[
            "rpm",
            "--version",
            "2021.03.15-R3",
            "--arch",
            "x86",
            "--type",
            "debug",
            "--key",
            "ABCD1234",
        ]);
        let config = RuntimeConfig::for_tests(
            "/work/pingnoo",
            ProductSettings::default(),
            OutputManager::new(false, true),
        );
        let settings = create_settings(args.command.package().unwrap(), &config).unwrap();
        assert_eq!(settings.arch(), Arch::X86);
        assert_eq!(settings.build_type(), BuildType::Debug);
        assert_eq!(settings.signing_key(), Some("ABCD1234"));
        match Job::from_command(&args.command) {
            Job::Package { request, secrets, .. } => {
                assert_eq!(request.package_type(), PackageType::Rpm);
                assert!(secrets.is_empty());
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn windows_pin_is_a_secret() {
        let args = args(&["windows", "--version", "2021.03.15-R3", "--pin", "424242"]);
        match Job::from_command(&args.command) {
            Job::Package { secrets, .. } => assert_eq!(secrets, vec!["424242".to_string()]),
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[test]
    fn bad_version_is_a_version_error() {
        let args = args(&["pkg", "--version", "2021.03.15 R3"]);
        let config = RuntimeConfig::for_tests(
            "/work/pingnoo",
            ProductSettings::default(),
            OutputManager::new(false, true),
        );
        let err = create_settings(args.command.package().unwrap(), &config).unwrap_err();
        assert!(matches!(err, crate::error::DeployError::Version(_)));
    }
}
