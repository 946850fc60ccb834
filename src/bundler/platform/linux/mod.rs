//! Linux packaging for .deb, .rpm, Arch and AppImage formats.
//!
//! # Build Requirements
//!
//! | Format | Required Tools |
//! |--------|----------------|
//! | .deb | `dpkg-deb`, `ldd`, `dpkg` (optionally `dpkg-sig`) |
//! | .rpm | `rpmbuild`, `rpmdev-setuptree`, `ldd`, `rpm` |
//! | .pkg.tar.* | `makepkg`, `ldd`, `pacman` (optionally `gpg`) |
//! | AppImage | Qt, `linuxdeployqt`, `appimagetool` (downloaded when missing) |
//!
//! # Output Location
//!
//! Packages are staged under `bin/<arch>/Deploy/` and land in `deployment/`:
//! - `deployment/pingnoo_2021.03.15-R3_amd64.deb`
//! - `deployment/pingnoo-2021.03.15-1.fc33.x86_64.rpm`
//! - `deployment/pingnoo-2021.03.15-1-x86_64.pkg.tar.zst`
//! - `deployment/Pingnoo [2021.03.15-R3] (x86_64).AppImage`

pub mod appimage;
pub mod debian;
pub mod pkg;
pub mod rpm;

use crate::bundler::{error::Result, settings::Settings, staging::StagingTree};
use std::path::{Path, PathBuf};

/// Where the application and its private libraries are installed.
pub(crate) fn app_dir(settings: &Settings) -> PathBuf {
    Path::new("usr/local/bin").join(&settings.product().package_name)
}

/// Stage the installed file layout shared by the .deb and .rpm packages.
///
/// `prefix` is the package root inside `staging` (empty for dpkg, the RPM
/// buildroot otherwise). Returns the staged application directory.
///
/// ```text
/// usr/local/bin/pingnoo/           binary, Components/, *.so
/// usr/share/icons/hicolor/512x512/apps/pingnoo.png
/// usr/share/applications/Pingnoo.desktop
/// usr/share/doc/pingnoo/copyright
/// etc/ld.so.conf.d/pingnoo.conf
/// ```
pub(crate) async fn stage_application_tree(
    settings: &Settings,
    staging: &StagingTree,
    prefix: &Path,
) -> Result<PathBuf> {
    let product = settings.product();
    let build_dir = settings.build_dir();
    let dpkg_dir = settings.resolve(&product.dpkg_dir);
    let app_dir = prefix.join(app_dir(settings));

    staging
        .copy_into(&build_dir.join(&product.name), &app_dir)
        .await?;
    staging
        .copy_tree(&build_dir.join("Components"), app_dir.join("Components"))
        .await?;
    let libraries = staging.copy_glob(&build_dir.join("*.so"), &app_dir).await?;
    log::debug!("staged {} shared libraries", libraries);

    staging
        .copy_file(
            &settings.resolve(&product.icon),
            prefix
                .join("usr/share/icons/hicolor/512x512/apps")
                .join(format!("{}.png", product.package_name)),
        )
        .await?;
    staging
        .copy_into(
            &dpkg_dir.join(format!("{}.desktop", product.name)),
            prefix.join("usr/share/applications"),
        )
        .await?;
    staging
        .copy_into(
            &dpkg_dir.join("copyright"),
            prefix.join("usr/share/doc").join(&product.package_name),
        )
        .await?;
    staging
        .copy_into(
            &dpkg_dir.join(format!("{}.conf", product.package_name)),
            prefix.join("etc/ld.so.conf.d"),
        )
        .await?;

    Ok(staging.join(app_dir))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A minimal compiled tree and packaging inputs.

    use crate::bundler::settings::{Settings, SettingsBuilder};
    use crate::version::ProductVersion;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Lay out `bin/x86_64/Release`, `dpkg/`, `rpm/`, `pkg/` and `installer/` under `root`.
    pub(crate) fn project(root: &Path) -> Settings {
        let build = root.join("bin/x86_64/Release");
        write(&build.join("Pingnoo"), "elf");
        write(&build.join("libRibbon.so"), "ribbon");
        write(&build.join("Components/libCore.so"), "core");
        write(&root.join("src/app/images/appicon-512x512-.png"), "png");

        write(&root.join("dpkg/control.in"), "Version: ${version}\nDepends: ${dependencies}\n");
        write(&root.join("dpkg/postinst"), "#!/bin/sh\nldconfig\n");
        write(&root.join("dpkg/Pingnoo.desktop"), "[Desktop Entry]\n");
        write(&root.join("dpkg/copyright"), "GPL-3\n");
        write(&root.join("dpkg/pingnoo.conf"), "/usr/local/bin/pingnoo\n");

        write(
            &root.join("rpm/pingnoo.spec.in"),
            "Version: ${version}\nRelease: ${release}\nBuildArch: ${build_arch}\nRequires: ${dependencies}\n# ${cmake_build_type}\n",
        );
        write(&root.join("pkg/PKGBUILD.in"), "pkgver=${version}\ndepends=(${dependencies})\n");
        write(&root.join("pkg/pingnoo.install"), "post_install() { :; }\n");

        write(&root.join("installer/Pingnoo.png"), "png");
        write(&root.join("installer/Pingnoo.desktop"), "[Desktop Entry]\n");
        write(&root.join("installer/AppRun"), "#!/bin/sh\n");

        SettingsBuilder::new()
            .root(root)
            .version(ProductVersion::parse("2021.03.15-R3").unwrap())
            .build()
            .unwrap()
    }
}
