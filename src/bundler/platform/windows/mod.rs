//! Windows packaging with Advanced Installer.
//!
//! # Build Requirements
//!
//! | Step | Required Tools | Notes |
//! |------|----------------|-------|
//! | Qt deployment | `windeployqt` | From `--qtdir` or `PATH` |
//! | Installer | `AdvancedInstaller.com` | Must be on `PATH` |
//! | Code signing | ScSignTool or `signtool.exe` | Downloaded with `curl` when missing |
//!
//! # Output Location
//!
//! - `deployment\Pingnoo Setup [2021.03.15-R3] (x86_64).exe`
//!
//! # Smartcard PIN
//!
//! `--pin` (or `PINGNOO_CERTIFICATE_PIN`) is passed to the signer as `-pin`
//! and masked whenever a command line is logged.

pub mod installer;
pub mod sign;
