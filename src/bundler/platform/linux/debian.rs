//! Debian package (.deb) bundler.
//!
//! Stages the install tree under `bin/<arch>/Deploy/dpkg`, writes
//! `DEBIAN/control` from `dpkg/control.in` with the dependencies discovered
//! by `ldd` + `dpkg -S`, writes `DEBIAN/md5sums` and hands the tree to
//! `dpkg-deb --build`.

use crate::bundler::{
    BundledArtifact, Bundler, PackageType,
    deps::{DependencyResolver, ProviderQuery},
    error::{Context, Result},
    executor::CommandRunner,
    staging::{PendingArtifact, StagingTree},
    template::PackageTemplate,
    utils::fs as ufs,
};
use std::path::{Path, PathBuf};

/// Options for the `deb` subcommand.
#[derive(Debug, Clone, Default)]
pub struct DebOptions {
    /// Output file; defaults to `deployment/<name>_<version>_<arch>.deb`
    pub output: Option<PathBuf>,
}

/// Split the requested output into its directory and file name.
fn output_location(
    root: &Path,
    default_dir: PathBuf,
    default_name: String,
    output: Option<&Path>,
) -> Result<(PathBuf, String)> {
    let Some(output) = output else {
        return Ok((default_dir, default_name));
    };
    let output = root.join(output);
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("--output must name a file")?;
    let dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    Ok((dir, name))
}

/// Bundle the project as a Debian package.
pub async fn bundle_project<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &DebOptions,
) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();
    let dpkg_dir = settings.resolve(&product.dpkg_dir);

    let arch = bundler
        .step("Checking architecture", async { settings.arch().debian() })
        .await?;

    let template = bundler
        .step(
            "Reading control template",
            PackageTemplate::load(&dpkg_dir.join("control.in")),
        )
        .await?;

    let staging = bundler
        .step("Creating package tree", async {
            let staging = StagingTree::recreate(settings.deploy_dir().join("dpkg")).await?;
            super::stage_application_tree(settings, &staging, Path::new("")).await?;
            let postinst = staging
                .copy_into(&dpkg_dir.join("postinst"), "DEBIAN")
                .await?;
            ufs::make_executable(&postinst).await?;
            Ok(staging)
        })
        .await?;

    let resolver = DependencyResolver::new(runner, ProviderQuery::Dpkg)?;
    let report = bundler
        .step(
            "Determining shared library dependencies",
            resolver.scan(&staging.join(super::app_dir(settings)), staging.path()),
        )
        .await?;
    let dependencies = bundler
        .step("Finding providing packages", resolver.resolve(&report))
        .await?;

    bundler
        .step("Writing control files", async {
            let depends = dependencies.packages().join(",");
            let control = template.render(&[
                ("version", settings.version().as_str()),
                ("dependencies", &depends),
            ])?;
            staging.write("DEBIAN/control", control).await?;
            staging.write("DEBIAN/md5sums", report.manifest()).await?;
            Ok(())
        })
        .await?;

    let (out_dir, out_name) = output_location(
        settings.root(),
        settings.deployment_dir(),
        format!("{}_{}_{}.deb", product.package_name, settings.version(), arch),
        options.output.as_deref(),
    )?;
    let pending = PendingArtifact::new(&out_dir, &out_name)?;

    bundler
        .step(
            "Building package",
            runner.checked(
                &format!(
                    "dpkg-deb --build \"{}\" \"{}\"",
                    staging.path().display(),
                    pending.path().display()
                ),
                "dpkg-deb failed to build the package.",
            ),
        )
        .await?;

    if let Some(key) = settings.signing_key() {
        bundler
            .step(
                "Signing package",
                runner.checked(
                    &format!("dpkg-sig -k {} -s origin \"{}\"", key, pending.path().display()),
                    "Signing failed.",
                ),
            )
            .await?;
    }

    bundler
        .step("Moving package into place", pending.persist(PackageType::Deb))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{executor::scripted::ScriptedRunner, platform::linux::fixtures};
    use crate::cli::OutputManager;

    fn runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .respond_always(
                "ldd",
                0,
                "\tlibRibbon.so => not found\n\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x1)\n",
            )
            .respond("dpkg -S libc.so.6", 0, "libc6:amd64: /lib/x86_64-linux-gnu/libc.so.6\n")
            .respond_always("dpkg-deb --build", 0, "dpkg-deb: building package 'pingnoo'\n")
    }

    #[tokio::test]
    async fn builds_package_with_resolved_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixtures::project(dir.path());
        let runner = runner();
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        let artifact = bundle_project(&bundler, &DebOptions::default()).await.unwrap();

        let expected = dir.path().join("deployment/pingnoo_2021.03.15-R3_amd64.deb");
        assert_eq!(artifact.paths, vec![expected.clone()]);
        assert!(expected.is_file());

        let dpkg = dir.path().join("bin/x86_64/Deploy/dpkg");
        let control = std::fs::read_to_string(dpkg.join("DEBIAN/control")).unwrap();
        assert_eq!(control, "Version: 2021.03.15-R3\nDepends: libc6\n");

        let md5sums = std::fs::read_to_string(dpkg.join("DEBIAN/md5sums")).unwrap();
        assert!(md5sums.contains("  usr/local/bin/pingnoo/Pingnoo\n"));
        assert!(md5sums.contains("  usr/local/bin/pingnoo/Components/libCore.so\n"));
        assert!(dpkg.join("etc/ld.so.conf.d/pingnoo.conf").is_file());
        assert!(dpkg.join("usr/share/icons/hicolor/512x512/apps/pingnoo.png").is_file());

        assert_eq!(runner.count("dpkg-sig"), 0);
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixtures::project(dir.path());
        let previous = dir.path().join("deployment/pingnoo_2021.03.15-R3_amd64.deb");
        std::fs::create_dir_all(previous.parent().unwrap()).unwrap();
        std::fs::write(&previous, b"good").unwrap();

        let runner = ScriptedRunner::new()
            .respond_always("ldd", 1, "not a dynamic executable\n")
            .respond("dpkg-deb --build", 2, "dpkg-deb: error: control file has bad permissions\n");
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        let err = bundle_project(&bundler, &DebOptions::default()).await.unwrap_err();
        assert!(err.is_reported());
        assert_eq!(std::fs::read(&previous).unwrap(), b"good");
        let leftovers = std::fs::read_dir(previous.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn unresolved_dependency_aborts_before_building() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fixtures::project(dir.path());
        let runner = ScriptedRunner::new()
            .respond_always("ldd", 0, "\tlibmystery.so.1 => /opt/libmystery.so.1 (0x1)\n")
            .respond_always("dpkg -S", 1, "dpkg-query: no path found matching pattern\n");
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        let err = bundle_project(&bundler, &DebOptions::default()).await.unwrap_err();
        assert!(err.is_reported());
        assert_eq!(runner.count("dpkg-deb"), 0);
    }

    #[tokio::test]
    async fn signs_and_honours_output_override() {
        let dir = tempfile::tempdir().unwrap();
        let settings = crate::bundler::SettingsBuilder::new()
            .root(dir.path())
            .version(crate::version::ProductVersion::parse("2021.03.15-R3").unwrap())
            .signing_key(Some("ABCD1234".into()))
            .build()
            .unwrap();
        fixtures::project(dir.path());

        let runner = runner().respond("dpkg-sig", 0, "Processing pingnoo.deb...\nSigned deb\n");
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);
        let options = DebOptions {
            output: Some(PathBuf::from("out/pingnoo.deb")),
        };

        let artifact = bundle_project(&bundler, &options).await.unwrap();
        assert_eq!(artifact.paths, vec![dir.path().join("out/pingnoo.deb")]);
        assert_eq!(runner.count("dpkg-sig -k ABCD1234 -s origin"), 1);
    }
}
