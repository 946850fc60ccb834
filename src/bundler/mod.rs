//! Packaging of a compiled Pingnoo tree into native installers.
//!
//! This module turns `bin/<arch>/<Type>/` into Linux packages (.deb, .rpm,
//! Arch `.pkg.tar.*`, AppImage), a notarized macOS disk image and a Windows
//! installer. The heavy lifting is done by platform tools; this module
//! stages their inputs, discovers shared library dependencies and checks
//! every tool's result.
//!
//! # Supported Formats
//!
//! | Platform | Formats | Tools |
//! |----------|---------|-------|
//! | Linux | .deb, .rpm, .pkg.tar.*, AppImage | dpkg-deb, rpmbuild, makepkg, linuxdeployqt |
//! | macOS | .dmg | macdeployqt, codesign, altool, create-dmg |
//! | Windows | .exe | windeployqt, signtool, Advanced Installer |
//!
//! # Example
//!
//! ```no_run
//! use pingnoo_deploy::bundler::{BundleRequest, Bundler, ShellRunner, SettingsBuilder};
//! use pingnoo_deploy::cli::OutputManager;
//! use pingnoo_deploy::version::ProductVersion;
//!
//! # async fn example() -> pingnoo_deploy::bundler::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .root(".")
//!     .version(ProductVersion::parse("2021.03.15-R3").expect("valid version"))
//!     .build()?;
//! let runner = ShellRunner::new();
//! let output = OutputManager::new(false, false);
//!
//! let bundler = Bundler::new(&settings, &runner, &output);
//! let artifact = bundler.bundle(&BundleRequest::Pkg).await?;
//! println!("SHA256: {}", artifact.checksum);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
pub mod deps;
pub mod error;
pub mod executor;
pub mod platform;
mod settings;
pub mod staging;
pub mod template;
pub mod tools;
mod utils;

// Public re-exports
pub use builder::{BundleRequest, Bundler};
pub use error::{Context, Error, ErrorExt, Result};
pub use executor::{CommandOutput, CommandRunner, ShellRunner};
pub use platform::PackageType;
pub use platform::linux::{appimage::AppImageOptions, debian::DebOptions, rpm::RpmOptions};
pub use platform::macos::dmg::DmgOptions;
pub use platform::windows::installer::WindowsOptions;
pub use settings::{Arch, BuildType, ProductSettings, Settings, SettingsBuilder};

/// A finished artifact in the deployment directory.
///
/// # Fields
///
/// - `package_type`: The format of the created package
/// - `paths`: The package followed by any detached signature
/// - `size`: Size of the package in bytes
/// - `checksum`: SHA-256 checksum of the package
#[derive(Debug, Clone)]
pub struct BundledArtifact {
    /// The package type that was created.
    pub package_type: PackageType,

    /// Paths to all files created as part of this bundle.
    ///
    /// The package itself comes first.
    pub paths: Vec<std::path::PathBuf>,

    /// Size of the main artifact in bytes.
    pub size: u64,

    /// SHA-256 checksum of the main artifact for integrity verification.
    pub checksum: String,
}
