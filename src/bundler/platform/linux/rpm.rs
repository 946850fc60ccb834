//! RPM package (.rpm) bundler.
//!
//! Builds a binary RPM from the already compiled tree: the install layout is
//! staged as the rpmbuild buildroot and `rpm/pingnoo.spec.in` is rendered
//! with the dependencies found through `rpm -q --whatprovides`.

use crate::bundler::{
    BundledArtifact, Bundler, PackageType,
    deps::{DependencyResolver, ProviderQuery},
    error::{Error, Result},
    executor::CommandRunner,
    staging::{PendingArtifact, StagingTree},
    template::PackageTemplate,
    tools,
};
use std::path::Path;

/// rpmbuild's working directories under `_topdir`.
const TOPDIR_LAYOUT: &[&str] = &["BUILD", "BUILDROOT", "RPMS", "SOURCES", "SPECS", "SRPMS"];

/// Options for the `rpm` subcommand.
#[derive(Debug, Clone)]
pub struct RpmOptions {
    /// Package release number
    pub release: String,
}

impl Default for RpmOptions {
    fn default() -> Self {
        Self {
            release: "1".to_string(),
        }
    }
}

/// Bundle the project as an RPM package.
pub async fn bundle_project<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &RpmOptions,
) -> Result<BundledArtifact> {
    bundler
        .step("Checking for rpmbuild", async {
            tools::check_prerequisites(&[
                ("rpmbuild", "rpm-build"),
                ("rpmdev-setuptree", "rpmdevtools"),
            ])
        })
        .await?;

    build_package(bundler, options).await
}

async fn build_package<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    options: &RpmOptions,
) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();
    let arch = settings.arch().rpm()?;
    let version = settings.version().rpm_version();
    let buildroot_rel = Path::new("BUILDROOT").join(&product.package_name);

    let template = bundler
        .step(
            "Reading spec template",
            PackageTemplate::load(
                &settings
                    .resolve(&product.rpm_dir)
                    .join(format!("{}.spec.in", product.package_name)),
            ),
        )
        .await?;

    let staging = bundler
        .step("Creating rpmbuild tree", async {
            let staging = StagingTree::recreate(settings.deploy_dir().join("rpm")).await?;
            staging.create_dirs(TOPDIR_LAYOUT).await?;
            super::stage_application_tree(settings, &staging, &buildroot_rel).await?;
            Ok(staging)
        })
        .await?;
    let buildroot = staging.join(&buildroot_rel);

    let resolver = DependencyResolver::new(
        runner,
        ProviderQuery::Rpm {
            sixty_four_bit: settings.arch().is_64bit(),
        },
    )?;
    let report = bundler
        .step(
            "Determining shared library dependencies",
            resolver.scan(&buildroot.join(super::app_dir(settings)), &buildroot),
        )
        .await?;
    let dependencies = bundler
        .step("Finding providing packages", resolver.resolve(&report))
        .await?;

    let spec = bundler
        .step("Creating specfile", async {
            let requires = dependencies.packages().join(", ");
            let rendered = template.render(&[
                ("version", version),
                ("release", &options.release),
                ("build_arch", arch),
                ("cmake_build_type", settings.build_type().dir_name()),
                ("dependencies", &requires),
            ])?;
            staging
                .write(
                    Path::new("SPECS").join(format!("{}.spec", product.package_name)),
                    rendered,
                )
                .await
        })
        .await?;

    let log_path = settings.resolve("rpmbuild.log");
    bundler
        .step(
            "Calling rpmbuild (logged to rpmbuild.log)",
            runner.checked_logged(
                &format!(
                    "rpmbuild -bb --target {} --define \"_topdir {}\" --buildroot \"{}\" \"{}\"",
                    arch,
                    staging.path().display(),
                    buildroot.display(),
                    spec.display()
                ),
                "rpmbuild failed",
                &log_path,
            ),
        )
        .await?;

    let dist = runner.run("rpm --eval %{?dist}").await?;
    let dist = if dist.success() { dist.text.trim().to_string() } else { String::new() };
    let final_name = format!(
        "{}-{}-{}{}.{}.rpm",
        product.package_name, version, options.release, dist, arch
    );
    let built = staging.join("RPMS").join(arch).join(&final_name);

    let pending = PendingArtifact::new(&settings.deployment_dir(), &final_name)?;
    bundler
        .step("Collecting package", async {
            if !built.is_file() {
                return Err(Error::GenericError(format!(
                    "rpmbuild did not produce {}",
                    built.display()
                )));
            }
            pending.fill_from(&built).await
        })
        .await?;

    if let Some(key) = settings.signing_key() {
        bundler
            .step(
                "Signing package",
                runner.checked(
                    &format!(
                        "rpm --define \"_gpg_name {}\" --addsign \"{}\"",
                        key,
                        pending.path().display()
                    ),
                    "Signing failed.",
                ),
            )
            .await?;
    }

    bundler
        .step("Moving package into place", pending.persist(PackageType::Rpm))
        .await
}
