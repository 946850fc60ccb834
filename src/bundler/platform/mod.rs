//! Platform-specific packaging pipelines.
//!
//! # Supported Platforms
//!
//! | Platform | Package Types | Module |
//! |----------|--------------|---------|
//! | Linux | .deb, .rpm, .pkg.tar.*, AppImage | [`linux`] |
//! | macOS | .dmg | [`macos`] |
//! | Windows | Advanced Installer .exe | [`windows`] |
//!
//! Every pipeline compiles on every host. They only shell out to native
//! tools, and a missing tool is reported as [`Error::ToolMissing`] at run
//! time rather than hidden behind `cfg` gates.
//!
//! [`Error::ToolMissing`]: crate::bundler::Error::ToolMissing

pub mod linux;
pub mod macos;
pub mod windows;

use std::fmt;

/// Supported package types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum PackageType {
    /// Debian package (.deb).
    Deb,

    /// RPM package (.rpm).
    Rpm,

    /// Arch Linux package built by `makepkg` from a PKGBUILD.
    Pkg,

    /// Linux AppImage (.AppImage).
    AppImage,

    /// Signed and notarized macOS disk image (.dmg).
    Dmg,

    /// Advanced Installer setup executable.
    WindowsInstaller,
}

impl PackageType {
    /// Returns the short name for this package type.
    ///
    /// This is the lowercase identifier used in CLI output and subcommands.
    pub fn short_name(&self) -> &'static str {
        match self {
            PackageType::Deb => "deb",
            PackageType::Rpm => "rpm",
            PackageType::Pkg => "pkg",
            PackageType::AppImage => "appimage",
            PackageType::Dmg => "dmg",
            PackageType::WindowsInstaller => "windows",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
