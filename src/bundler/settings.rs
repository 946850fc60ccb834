//! Configuration structures for packaging runs.
//!
//! [`Settings`] is the explicit configuration passed to every pipeline. It is
//! assembled by [`SettingsBuilder`] from command line flags and the optional
//! project file described by [`ProductSettings`].

use crate::bundler::error::{Error, Result};
use crate::version::ProductVersion;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CPU architecture of the build being packaged.
///
/// The names match the `bin/<arch>/` directories produced by the CMake build.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, clap::ValueEnum)]
pub enum Arch {
    /// x86_64 / AMD64 (64-bit)
    #[value(name = "x86_64")]
    X86_64,
    /// x86 / i686 (32-bit)
    #[value(name = "x86")]
    X86,
    /// Apple Silicon / AArch64
    #[value(name = "arm64")]
    Arm64,
    /// macOS universal binary (x86_64 + arm64)
    #[value(name = "universal")]
    Universal,
}

impl Arch {
    /// Directory name under `bin/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::X86 => "x86",
            Arch::Arm64 => "arm64",
            Arch::Universal => "universal",
        }
    }

    /// Debian architecture name.
    pub fn debian(&self) -> Result<&'static str> {
        match self {
            Arch::X86_64 => Ok("amd64"),
            Arch::X86 => Ok("i386"),
            Arch::Arm64 => Ok("arm64"),
            Arch::Universal => Err(Error::ArchError(
                "universal builds cannot be packaged for Debian".to_string(),
            )),
        }
    }

    /// RPM `--target` architecture name.
    pub fn rpm(&self) -> Result<&'static str> {
        match self {
            Arch::X86_64 => Ok("x86_64"),
            Arch::X86 => Ok("i686"),
            Arch::Arm64 => Ok("aarch64"),
            Arch::Universal => Err(Error::ArchError(
                "universal builds cannot be packaged as RPM".to_string(),
            )),
        }
    }

    /// Whether shared libraries carry the `()(64bit)` RPM capability suffix.
    pub fn is_64bit(&self) -> bool {
        !matches!(self, Arch::X86)
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Build configuration to package.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum BuildType {
    /// Optimised build
    #[default]
    Release,
    /// Debug build
    Debug,
}

impl BuildType {
    /// Directory name under `bin/<arch>/`, also the CMake build type.
    pub fn dir_name(&self) -> &'static str {
        match self {
            BuildType::Release => "Release",
            BuildType::Debug => "Debug",
        }
    }
}

/// Product layout and naming, optionally loaded from `pingnoo-deploy.toml`.
///
/// Every path is relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductSettings {
    /// Display name (also the binary and `.app` name)
    pub name: String,
    /// Lowercase package name
    pub package_name: String,
    /// Bundle identifier prefix used for notarization uploads
    pub bundle_id: String,
    /// Directory holding `control.in`, `postinst`, `pingnoo.conf`, `copyright`, `Pingnoo.desktop`
    pub dpkg_dir: PathBuf,
    /// Directory holding `pingnoo.spec.in`
    pub rpm_dir: PathBuf,
    /// Directory holding `PKGBUILD.in` and `pingnoo.install`
    pub pkg_dir: PathBuf,
    /// Directory holding AppImage and Windows installer inputs
    pub installer_dir: PathBuf,
    /// Directory holding the DMG background artwork
    pub artwork_dir: PathBuf,
    /// 512x512 application icon
    pub icon: PathBuf,
    /// Docker registry images are pushed to
    pub registry: String,
    /// Seconds between notarization status checks
    pub notarize_interval_secs: u64,
    /// Seconds before notarization polling gives up
    pub notarize_timeout_secs: u64,
    /// Authenticode timestamp server
    pub timeserver: String,
    /// linuxdeployqt release download
    pub linuxdeployqt_url: String,
    /// appimagetool release download
    pub appimagetool_url: String,
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            name: "Pingnoo".to_string(),
            package_name: "pingnoo".to_string(),
            bundle_id: "com.nedrysoft.pingnoo".to_string(),
            dpkg_dir: PathBuf::from("dpkg"),
            rpm_dir: PathBuf::from("rpm"),
            pkg_dir: PathBuf::from("pkg"),
            installer_dir: PathBuf::from("installer"),
            artwork_dir: PathBuf::from("artwork"),
            icon: PathBuf::from("src/app/images/appicon-512x512-.png"),
            registry: "registry.fizzyade.com".to_string(),
            notarize_interval_secs: 10,
            notarize_timeout_secs: 3600,
            timeserver: "http://time.certum.pl/".to_string(),
            linuxdeployqt_url:
                "https://github.com/probonopd/linuxdeployqt/releases/download/6/linuxdeployqt-6-x86_64.AppImage"
                    .to_string(),
            appimagetool_url:
                "https://github.com/AppImage/AppImageKit/releases/download/continuous/appimagetool-x86_64.AppImage"
                    .to_string(),
        }
    }
}

/// Configuration for one packaging run.
#[derive(Debug, Clone)]
pub struct Settings {
    root: PathBuf,
    arch: Arch,
    build_type: BuildType,
    version: ProductVersion,
    signing_key: Option<String>,
    certificate: Option<String>,
    product: ProductSettings,
}

impl Settings {
    /// Project root every relative path is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target architecture.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Build configuration.
    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    /// Product version.
    pub fn version(&self) -> &ProductVersion {
        &self.version
    }

    /// GPG key id used to sign Linux packages.
    pub fn signing_key(&self) -> Option<&str> {
        self.signing_key.as_deref()
    }

    /// Code signing certificate identity.
    pub fn certificate(&self) -> Option<&str> {
        self.certificate.as_deref()
    }

    /// Product layout and naming.
    pub fn product(&self) -> &ProductSettings {
        &self.product
    }

    /// Resolve a project relative path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Compiled output, `bin/<arch>/<Type>`.
    pub fn build_dir(&self) -> PathBuf {
        self.build_dir_for(self.arch)
    }

    /// Compiled output of another architecture (used for universal builds).
    pub fn build_dir_for(&self, arch: Arch) -> PathBuf {
        self.root
            .join("bin")
            .join(arch.dir_name())
            .join(self.build_type.dir_name())
    }

    /// Staging area, `bin/<arch>/Deploy`.
    pub fn deploy_dir(&self) -> PathBuf {
        self.root.join("bin").join(self.arch.dir_name()).join("Deploy")
    }

    /// Final artifact directory, `deployment/`.
    pub fn deployment_dir(&self) -> PathBuf {
        self.root.join("deployment")
    }

    /// Downloaded and cloned helper tools, `tools/`.
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    root: Option<PathBuf>,
    arch: Option<Arch>,
    build_type: BuildType,
    version: Option<ProductVersion>,
    signing_key: Option<String>,
    certificate: Option<String>,
    product: ProductSettings,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the project root.
    ///
    /// # Required
    pub fn root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the target architecture. Default: x86_64
    pub fn arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Sets the build configuration. Default: Release
    pub fn build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    /// Sets the product version.
    ///
    /// # Required
    pub fn version(mut self, version: ProductVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the GPG key used to sign Linux packages.
    pub fn signing_key(mut self, key: Option<String>) -> Self {
        self.signing_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Sets the code signing certificate.
    pub fn certificate(mut self, cert: Option<String>) -> Self {
        self.certificate = cert.filter(|c| !c.is_empty());
        self
    }

    /// Sets the product layout.
    pub fn product(mut self, product: ProductSettings) -> Self {
        self.product = product;
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` or `version` is missing.
    pub fn build(self) -> Result<Settings> {
        use crate::bundler::error::Context;

        Ok(Settings {
            root: self.root.context("project root is required")?,
            arch: self.arch.unwrap_or(Arch::X86_64),
            build_type: self.build_type,
            version: self.version.context("a version is required (see --version)")?,
            signing_key: self.signing_key,
            certificate: self.certificate,
            product: self.product,
        })
    }
}
