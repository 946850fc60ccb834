//! Bundle orchestration.
//!
//! [`Bundler`] ties the run's [`Settings`], the [`CommandRunner`] every tool
//! invocation goes through and the step printer together, and dispatches a
//! [`BundleRequest`] to the matching platform pipeline.
//!
//! # Example
//!
//! ```no_run
//! use pingnoo_deploy::bundler::{BundleRequest, Bundler, DebOptions, Settings, ShellRunner};
//! use pingnoo_deploy::cli::OutputManager;
//!
//! # async fn example(settings: Settings) -> pingnoo_deploy::bundler::Result<()> {
//! let runner = ShellRunner::new();
//! let output = OutputManager::new(false, false);
//! let bundler = Bundler::new(&settings, &runner, &output);
//!
//! let artifact = bundler
//!     .bundle(&BundleRequest::Deb(DebOptions::default()))
//!     .await?;
//! println!("Created: {} ({} bytes)", artifact.package_type, artifact.size);
//! # Ok(())
//! # }
//! ```

use crate::bundler::{
    BundledArtifact, PackageType, Result, Settings,
    executor::CommandRunner,
    platform::{
        linux::{self, appimage::AppImageOptions, debian::DebOptions, rpm::RpmOptions},
        macos::{self, dmg::DmgOptions},
        windows::{self, installer::WindowsOptions},
    },
};
use crate::cli::OutputManager;
use std::future::Future;

/// One packaging job and its format specific options.
#[derive(Debug, Clone)]
pub enum BundleRequest {
    /// Debian package
    Deb(DebOptions),
    /// RPM package
    Rpm(RpmOptions),
    /// Arch Linux package
    Pkg,
    /// AppImage
    AppImage(AppImageOptions),
    /// macOS disk image
    Dmg(DmgOptions),
    /// Windows installer
    Windows(WindowsOptions),
}

impl BundleRequest {
    /// Package type this request produces.
    pub fn package_type(&self) -> PackageType {
        match self {
            BundleRequest::Deb(_) => PackageType::Deb,
            BundleRequest::Rpm(_) => PackageType::Rpm,
            BundleRequest::Pkg => PackageType::Pkg,
            BundleRequest::AppImage(_) => PackageType::AppImage,
            BundleRequest::Dmg(_) => PackageType::Dmg,
            BundleRequest::Windows(_) => PackageType::WindowsInstaller,
        }
    }
}

/// Main bundler orchestrator.
///
/// Borrowed state only; one bundler serves one run.
pub struct Bundler<'a, R> {
    settings: &'a Settings,
    runner: &'a R,
    output: &'a OutputManager,
}

impl<R> std::fmt::Debug for Bundler<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a, R: CommandRunner> Bundler<'a, R> {
    /// Creates a bundler for one run.
    pub fn new(settings: &'a Settings, runner: &'a R, output: &'a OutputManager) -> Self {
        Self {
            settings,
            runner,
            output,
        }
    }

    /// Returns a reference to the bundler settings.
    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Runner every external tool goes through.
    pub fn runner(&self) -> &'a R {
        self.runner
    }

    /// Console output.
    pub fn output(&self) -> &'a OutputManager {
        self.output
    }

    /// Run `operation` as a printed step.
    pub async fn step<T, F>(&self, message: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.output.step(message, operation).await
    }

    /// Build the artifact described by `request`.
    pub async fn bundle(&self, request: &BundleRequest) -> Result<BundledArtifact> {
        log::debug!(
            "bundling {} for {} ({})",
            request.package_type(),
            self.settings.arch(),
            self.settings.version()
        );

        let artifact = match request {
            BundleRequest::Deb(options) => linux::debian::bundle_project(self, options).await?,
            BundleRequest::Rpm(options) => linux::rpm::bundle_project(self, options).await?,
            BundleRequest::Pkg => linux::pkg::bundle_project(self).await?,
            BundleRequest::AppImage(options) => {
                linux::appimage::bundle_project(self, options).await?
            }
            BundleRequest::Dmg(options) => macos::dmg::bundle_project(self, options).await?,
            BundleRequest::Windows(options) => {
                windows::installer::bundle_project(self, options).await?
            }
        };

        log::info!(
            "✓ {} ({} bytes, sha256 {})",
            artifact.paths.first().map(|p| p.display().to_string()).unwrap_or_default(),
            artifact.size,
            artifact.checksum
        );
        Ok(artifact)
    }
}
