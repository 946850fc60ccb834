//! Shell command execution.
//!
//! Every packaging step shells out to a platform tool. [`CommandRunner`] is the
//! seam between the pipelines and the host: [`ShellRunner`] runs commands
//! through the system shell, while tests substitute a scripted runner that
//! replays captured tool output.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{
    path::Path,
    process::{ExitStatus, Stdio},
};
use tokio::process::Command;

/// Exit code and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (`-1` when terminated by a signal)
    pub code: i32,
    /// Captured stdout followed by captured stderr
    pub text: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs shell command lines and reports their outcome.
///
/// Implementations never enforce a timeout; a hung tool blocks the caller.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `command` to completion and return its exit code and output.
    ///
    /// A non-zero exit is not an error at this level.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Whether tool output goes straight to the terminal.
    fn streams_output(&self) -> bool {
        false
    }

    /// Run `command`, failing with [`Error::ToolFailed`] on a non-zero exit.
    ///
    /// Returns the combined output when the command succeeds.
    async fn checked(&self, command: &str, fail_msg: &str) -> Result<String> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output.text)
        } else {
            Err(Error::ToolFailed {
                message: fail_msg.to_string(),
                output: output.text,
            })
        }
    }

    /// Like [`checked`](Self::checked), but also writes the combined output to `log`.
    ///
    /// The log is written before the exit status is inspected so failures can
    /// be diagnosed from the file.
    async fn checked_logged(&self, command: &str, fail_msg: &str, log: &Path) -> Result<String> {
        let output = self.run(command).await?;
        tokio::fs::write(log, &output.text)
            .await
            .fs_context("writing command log", log)?;
        if output.success() {
            Ok(output.text)
        } else {
            Err(Error::ToolFailed {
                message: fail_msg.to_string(),
                output: output.text,
            })
        }
    }
}

/// Prefix `command` so it runs with `dir` as the working directory.
pub fn in_dir(dir: &Path, command: &str) -> String {
    if cfg!(windows) {
        format!("cd /d \"{}\" && {}", dir.display(), command)
    } else {
        format!("cd \"{}\" && {}", dir.display(), command)
    }
}

/// Runs commands through `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    inherit: bool,
    secrets: Vec<String>,
}

impl ShellRunner {
    /// Create a runner that captures command output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward output to the terminal instead of capturing it.
    ///
    /// Used for long running builds (docker) where progress matters more than
    /// the captured text. [`CommandOutput::text`] is empty in this mode.
    pub fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }

    /// Mask `secret` whenever a command line is logged.
    pub fn redacting(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    fn redact(&self, command: &str) -> String {
        self.secrets
            .iter()
            .fold(command.to_string(), |line, secret| line.replace(secret.as_str(), "********"))
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

impl CommandRunner for ShellRunner {
    fn streams_output(&self) -> bool {
        self.inherit
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let shown = self.redact(command);
        log::debug!("$ {}", shown);

        let mut cmd = Self::shell(command);
        cmd.stdin(Stdio::null());

        if self.inherit {
            let status = cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|error| Error::CommandFailed {
                    command: shown.clone(),
                    error,
                })?;
            return Ok(CommandOutput {
                code: exit_code(status),
                text: String::new(),
            });
        }

        let output = cmd.output().await.map_err(|error| Error::CommandFailed {
            command: shown.clone(),
            error,
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let code = exit_code(output.status);
        if code != 0 {
            log::debug!("command exited with {}: {}", code, shown);
        }

        Ok(CommandOutput { code, text })
    }
}
