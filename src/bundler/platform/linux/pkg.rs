//! Arch Linux package bundler.
//!
//! Renders `pkg/PKGBUILD.in` into `bin/<arch>/Deploy` with the packages that
//! `pacman -F` reports as providing the compiled tree's shared libraries, then
//! runs `makepkg` there.

use crate::bundler::{
    BundledArtifact, Bundler, PackageType,
    deps::{DependencyResolver, ProviderQuery},
    error::{Context, Result},
    executor::{CommandRunner, in_dir},
    staging::{PendingArtifact, StagingTree},
    template::PackageTemplate,
};
use std::path::{Path, PathBuf};

/// PKGBUILD array body: `'a' 'b'`, or nothing when there are no dependencies.
fn depends_array(packages: &[String]) -> String {
    packages
        .iter()
        .map(|p| format!("'{p}'"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The package `makepkg` wrote into `dir` (signatures excluded).
fn find_built_package(dir: &Path) -> Result<PathBuf> {
    let pattern = dir.join("*.pkg.tar.*");
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        if path.extension().is_some_and(|ext| ext == "sig") {
            continue;
        }
        return Ok(path);
    }
    None::<PathBuf>.with_context(|| format!("makepkg did not produce a package in {}", dir.display()))
}

/// Bundle the project as an Arch Linux package.
pub async fn bundle_project<R: CommandRunner>(bundler: &Bundler<'_, R>) -> Result<BundledArtifact> {
    let settings = bundler.settings();
    let product = settings.product();
    let runner = bundler.runner();
    let pkg_dir = settings.resolve(&product.pkg_dir);
    let build_dir = settings.build_dir();

    let template = bundler
        .step(
            "Reading PKGBUILD template",
            PackageTemplate::load(&pkg_dir.join("PKGBUILD.in")),
        )
        .await?;

    let staging = bundler
        .step("Preparing deploy directory", async {
            let staging = StagingTree::recreate(settings.deploy_dir()).await?;
            staging
                .copy_into(
                    &pkg_dir.join(format!("{}.install", product.package_name)),
                    "",
                )
                .await?;
            Ok(staging)
        })
        .await?;

    let resolver = DependencyResolver::new(runner, ProviderQuery::Pacman)?;
    let report = bundler
        .step(
            "Determining shared library dependencies",
            resolver.scan(&build_dir, &build_dir),
        )
        .await?;
    let dependencies = bundler
        .step("Finding providing packages", resolver.resolve(&report))
        .await?;

    bundler
        .step("Creating PKGBUILD file", async {
            let depends = depends_array(&dependencies.packages());
            let pkgbuild = template.render(&[
                ("version", settings.version().as_str()),
                ("dependencies", &depends),
            ])?;
            staging.write("PKGBUILD", pkgbuild).await?;
            Ok(())
        })
        .await?;

    bundler
        .step(
            "Bundling package",
            runner.checked(&in_dir(staging.path(), "makepkg"), "Failed to build!"),
        )
        .await?;

    let built = find_built_package(staging.path())?;
    let signature = match settings.signing_key() {
        Some(key) => {
            bundler
                .step(
                    "Signing package",
                    runner.checked(
                        &format!(
                            "gpg --batch --yes --detach-sign -u {} \"{}\"",
                            key,
                            built.display()
                        ),
                        "Signing failed.",
                    ),
                )
                .await?;
            let mut sig = built.clone().into_os_string();
            sig.push(".sig");
            Some(PathBuf::from(sig))
        }
        None => None,
    };

    let name = built
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("package has no file name")?;
    let pending = PendingArtifact::new(&settings.deployment_dir(), &name)?;
    let pending_sig = match &signature {
        Some(sig) => {
            let pending = PendingArtifact::new(&settings.deployment_dir(), &format!("{name}.sig"))?;
            Some((pending, sig))
        }
        None => None,
    };

    bundler
        .step("Moving package into place", async {
            pending.fill_from(&built).await?;
            let signed = match pending_sig {
                Some((pending_sig, sig)) => {
                    pending_sig.fill_from(sig).await?;
                    Some(pending_sig.persist(PackageType::Pkg).await?)
                }
                None => None,
            };
            let mut artifact = pending.persist(PackageType::Pkg).await?;
            if let Some(signed) = signed {
                artifact.paths.extend(signed.paths);
            }
            Ok(artifact)
        })
        .await
}
