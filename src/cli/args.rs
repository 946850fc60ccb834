//! Command line argument parsing and validation.
//!
//! One subcommand per artifact. Every packaging subcommand shares
//! [`PackageArgs`]; platform flags sit on the subcommand that uses them.

use crate::bundler::{Arch, BuildType, ProductSettings};
use crate::error::CliError;
use clap::{Args as ClapArgs, Parser, Subcommand};
use path_absolutize::Absolutize;
use std::path::PathBuf;

/// Pingnoo deployment tool
#[derive(Parser, Debug)]
#[command(
    name = "pingnoo_deploy",
    about = "Pingnoo deployment tool",
    long_about = "Package a compiled Pingnoo tree into native installers and build the CI images.

Usage:
  pingnoo_deploy deb --version 2021.03.15-R3
  pingnoo_deploy dmg --arch universal --version 2021.03.15-R3 --appleid me@example.com --password @keychain:AC_PASSWORD
  pingnoo_deploy docker fedora-33 --all --user jenkins --group docker",
    disable_version_flag = true
)]
pub struct Args {
    /// Command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (defaults to pingnoo-deploy.toml in the project root)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress step output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Flags shared by every packaging subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct PackageArgs {
    /// Architecture to deploy
    #[arg(long, value_enum, default_value = "x86_64")]
    pub arch: Arch,

    /// Type of build to deploy
    #[arg(long = "type", value_enum, default_value = "release")]
    pub build_type: BuildType,

    /// Version string, e.g. 2021.03.15-R3
    #[arg(long)]
    pub version: String,

    /// GPG key id to sign Linux packages with
    #[arg(long)]
    pub key: Option<String>,

    /// Certificate to sign with
    #[arg(long, env = "PINGNOO_DEVELOPER_CERTIFICATE", hide_env_values = true)]
    pub cert: Option<String>,
}

/// Flags of the `docker` subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct DockerArgs {
    /// Image to build (the folder that contains the Dockerfile)
    pub image: String,

    /// Also build the -base and -builder images
    #[arg(long)]
    pub all: bool,

    /// User to run the build as
    #[arg(long)]
    pub user: Option<String>,

    /// Group to run the build as
    #[arg(long)]
    pub group: Option<String>,

    /// Registry to push to (defaults to the configured registry)
    #[arg(long)]
    pub registry: Option<String>,

    /// Directory holding the image folders, relative to the project root
    #[arg(long, default_value = "docker")]
    pub images_dir: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a Debian package
    Deb {
        #[command(flatten)]
        package: PackageArgs,

        /// Output file (defaults to deployment/<name>_<version>_<arch>.deb)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Build an RPM package
    Rpm {
        #[command(flatten)]
        package: PackageArgs,

        /// Package release number
        #[arg(long, default_value = "1")]
        release: String,
    },

    /// Build an Arch Linux package
    Pkg {
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Build an AppImage
    #[command(name = "appimage")]
    AppImage {
        #[command(flatten)]
        package: PackageArgs,

        /// Path to qt
        #[arg(long)]
        qtdir: Option<PathBuf>,

        /// Path to linuxdeployqt
        #[arg(long)]
        linuxdeployqt: Option<PathBuf>,

        /// Path to appimagetool
        #[arg(long)]
        appimagetool: Option<PathBuf>,
    },

    /// Build a signed and notarized macOS disk image
    Dmg {
        #[command(flatten)]
        package: PackageArgs,

        /// Path to qt
        #[arg(long)]
        qtdir: Option<PathBuf>,

        /// Apple ID to use for notarization
        #[arg(long = "appleid")]
        apple_id: Option<String>,

        /// Password for the Apple ID
        #[arg(long)]
        password: Option<String>,

        /// Seconds to wait for a notarization verdict
        #[arg(long, value_name = "SECS")]
        notarize_timeout: Option<u64>,
    },

    /// Build a Windows installer
    Windows {
        #[command(flatten)]
        package: PackageArgs,

        /// Path to qt
        #[arg(long)]
        qtdir: Option<PathBuf>,

        /// Path to curl binary
        #[arg(long = "curlbin")]
        curl: Option<PathBuf>,

        /// Path to signing binary
        #[arg(long)]
        signtool: Option<PathBuf>,

        /// Time server to use for signing
        #[arg(long)]
        timeserver: Option<String>,

        /// Smartcard PIN for the signing certificate
        #[arg(long, env = "PINGNOO_CERTIFICATE_PIN", hide_env_values = true)]
        pin: Option<String>,
    },

    /// Build and push a CI Docker image
    Docker(DockerArgs),
}

impl Command {
    /// Subcommand name, for messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deb { .. } => "deb",
            Command::Rpm { .. } => "rpm",
            Command::Pkg { .. } => "pkg",
            Command::AppImage { .. } => "appimage",
            Command::Dmg { .. } => "dmg",
            Command::Windows { .. } => "windows",
            Command::Docker(_) => "docker",
        }
    }

    /// Shared packaging flags, `None` for `docker`.
    pub fn package(&self) -> Option<&PackageArgs> {
        match self {
            Command::Deb { package, .. }
            | Command::Rpm { package, .. }
            | Command::Pkg { package }
            | Command::AppImage { package, .. }
            | Command::Dmg { package, .. }
            | Command::Windows { package, .. } => Some(package),
            Command::Docker(_) => None,
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(package) = self.command.package() {
            if package.version.trim().is_empty() {
                return Err("--version must not be empty".to_string());
            }
            let universal_ok = matches!(self.command, Command::Dmg { .. });
            if package.arch == Arch::Universal && !universal_ok {
                return Err("--arch universal is only supported by the dmg command".to_string());
            }
        }
        if let Command::Docker(docker) = &self.command
            && docker.image.trim().is_empty()
        {
            return Err("an image name is required".to_string());
        }
        Ok(())
    }

    /// Absolute project root.
    pub fn project_root(&self) -> std::io::Result<PathBuf> {
        Ok(self.root.absolutize()?.into_owned())
    }
}

/// Configuration derived from command line arguments and the project file
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
    /// Absolute project root
    pub root: PathBuf,
    /// Product layout and naming
    pub product: ProductSettings,
}

impl RuntimeConfig {
    /// Resolve the project root and load its configuration file
    pub fn load(args: &Args) -> crate::error::Result<Self> {
        let root = args.project_root().map_err(|e| CliError::ProjectRoot {
            reason: e.to_string(),
        })?;
        let product = crate::config::load_product_settings(&root, args.config.as_deref())?;
        Ok(Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            root,
            product,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(root: impl Into<PathBuf>, product: ProductSettings, output: super::OutputManager) -> Self {
        Self {
            output,
            root: root.into(),
            product,
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }
}
