//! # Pingnoo Deploy
//!
//! Turns a compiled Pingnoo tree into native installers and builds the
//! Docker images the CI farm compiles it in.
//!
//! The packaging work is delegated to the platform tools (`dpkg-deb`,
//! `rpmbuild`, `makepkg`, `linuxdeployqt`, `macdeployqt`, `create-dmg`,
//! Advanced Installer, `docker`). This crate stages the files, resolves the
//! runtime dependencies, drives the tools and keeps the operator informed.
//!
//! ## Usage
//!
//! ```bash
//! pingnoo_deploy deb --version 2021.03.15-R3 --key ABCD1234
//! pingnoo_deploy appimage --version 2021.03.15-R3 --qtdir /opt/Qt/5.15.2/gcc_64
//! pingnoo_deploy dmg --arch universal --version 2021.03.15-R3 --appleid me@example.com
//! pingnoo_deploy windows --arch x86 --version 2021.03.15-R3 --cert "Pingnoo Ltd"
//! pingnoo_deploy docker fedora-33 --all
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod version;

pub use bundler::{BundledArtifact, Bundler, PackageType, Settings};
pub use cli::Args;
pub use error::{DeployError, Result};
pub use version::ProductVersion;
