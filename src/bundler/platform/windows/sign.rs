//! Authenticode signing through a `signtool` compatible executable.
//!
//! The default signer is MGTEK's ScSignTool, which wraps `signtool` and can
//! take the smartcard PIN on the command line. It is downloaded into
//! `tools/smartcardtools` when missing.

use crate::bundler::{
    error::{ErrorExt, Result},
    executor::{CommandRunner, in_dir},
};
use std::path::{Path, PathBuf};

const SMARTCARDTOOLS_URL: &str = "https://www.mgtek.com/files/smartcardtools.zip";
const UNZIP_URL: &str = "ftp://ftp.info-zip.org/pub/infozip/win32/unz600xn.exe";

/// Default signer location relative to the project root.
pub const DEFAULT_SIGNTOOL: &str = "tools/smartcardtools/x64/ScSignTool.exe";

/// A signing identity and the tool that applies it.
#[derive(Debug, Clone)]
pub struct Signer {
    signtool: PathBuf,
    cert: String,
    timeserver: String,
    pin: Option<String>,
}

impl Signer {
    /// Sign with certificate `cert`, timestamping against `timeserver`.
    pub fn new(signtool: impl Into<PathBuf>, cert: impl Into<String>, timeserver: impl Into<String>) -> Self {
        Self {
            signtool: signtool.into(),
            cert: cert.into(),
            timeserver: timeserver.into(),
            pin: None,
        }
    }

    /// Smartcard PIN passed as `-pin`.
    pub fn pin(mut self, pin: Option<String>) -> Self {
        self.pin = pin.filter(|p| !p.is_empty());
        self
    }

    /// Signing invocation for `file`.
    pub fn command(&self, file: &Path) -> String {
        let pin = match &self.pin {
            Some(pin) => format!("-pin {pin} "),
            None => String::new(),
        };
        format!(
            "\"{}\" {}sign /n \"{}\" /t {} /fd sha256 /v \"{}\"",
            self.signtool.display(),
            pin,
            self.cert,
            self.timeserver,
            file.display()
        )
    }

    /// Sign `file`.
    pub async fn sign<R: CommandRunner>(&self, runner: &R, file: &Path) -> Result<()> {
        runner
            .checked(
                &self.command(file),
                &format!("there was a problem signing a file ({}).", file.display()),
            )
            .await?;
        Ok(())
    }
}

/// Download SmartCardTools and unpack it into `dest`.
///
/// `curl` fetches both the archive and an info-zip `unzip`, since a stock
/// Windows install has no command line unzip.
pub async fn download_smartcardtools<R: CommandRunner>(runner: &R, curl: &Path, dest: &Path) -> Result<()> {
    let temp = tempfile::tempdir().fs_context("creating temporary directory", std::env::temp_dir())?;
    let temp_path = temp.path();

    runner
        .checked(
            &in_dir(temp_path, &format!("\"{}\" -LJO {}", curl.display(), SMARTCARDTOOLS_URL)),
            "unable to download SmartCardTools.",
        )
        .await?;
    runner
        .checked(
            &in_dir(
                temp_path,
                &format!("\"{}\" -LJO {} & unz600xn -jo unzip.exe", curl.display(), UNZIP_URL),
            ),
            "unable to download info-zip tools.",
        )
        .await?;
    runner
        .checked(
            &format!(
                "\"{}\" \"{}\" -d \"{}\"",
                temp_path.join("unzip").display(),
                temp_path.join("smartcardtools.zip").display(),
                dest.display()
            ),
            "unable to unzip SmartCardTools.",
        )
        .await?;
    Ok(())
}
