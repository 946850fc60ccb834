//! Apple notarization through `xcrun altool`.
//!
//! A submission yields a request id; the request is then polled until the
//! service reports a terminal status. Polling is bounded by an optional
//! timeout so a request stuck in progress cannot hang the run forever.

use crate::bundler::{
    error::{Error, Result},
    executor::CommandRunner,
};
use regex::Regex;
use std::{fmt, path::Path, time::Duration};
use tokio::time::Instant;

/// Default delay between status checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Status keyword reported by the notarization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotarizationStatus {
    /// `in progress`
    InProgress,
    /// `success`
    Success,
    /// `invalid`
    Invalid,
}

impl NotarizationStatus {
    /// Parse a status keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim() {
            "in progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Whether polling stops at this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Keyword as printed by altool.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::Success => "success",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for NotarizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Extracts request ids and status lines from altool output.
#[derive(Debug, Clone)]
pub struct NotarizationParser {
    request_id: Regex,
    status: Regex,
}

impl NotarizationParser {
    /// Compile the patterns.
    pub fn new() -> Result<Self> {
        Ok(Self {
            request_id: Regex::new(r"RequestUUID\s=\s(?P<uuid>[a-f0-9-]{36})")?,
            status: Regex::new(r"(?m)^\s*Status:\s(?P<status>[A-Za-z ]+?)\s*$")?,
        })
    }

    /// Request id from a submission's output.
    pub fn request_id(&self, output: &str) -> Option<String> {
        self.request_id
            .captures(output)
            .and_then(|caps| caps.name("uuid"))
            .map(|m| m.as_str().to_string())
    }

    /// Status keyword from a status check's output, if a status line is present.
    ///
    /// An unrecognised keyword is a parse error rather than "still pending".
    pub fn status(&self, output: &str) -> Result<Option<NotarizationStatus>> {
        let Some(keyword) = self
            .status
            .captures(output)
            .and_then(|caps| caps.name("status"))
            .map(|m| m.as_str().to_lowercase())
        else {
            return Ok(None);
        };

        NotarizationStatus::from_keyword(&keyword)
            .map(Some)
            .ok_or_else(|| Error::Parse {
                tool: "altool".into(),
                what: format!("notarization status (unknown keyword '{keyword}')"),
                output: output.to_string(),
            })
    }
}

/// Terminal result of a polled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotarizationOutcome {
    /// Server issued request id
    pub request_id: String,
    /// Terminal status
    pub status: NotarizationStatus,
    /// Number of times the poller slept before reaching it
    pub waits: u32,
}

/// Submits artifacts for notarization and waits for the verdict.
pub struct NotarizationPoller<'a, R> {
    runner: &'a R,
    parser: NotarizationParser,
    apple_id: String,
    password: String,
    bundle_id: String,
    interval: Duration,
    timeout: Option<Duration>,
}

impl<'a, R: CommandRunner> NotarizationPoller<'a, R> {
    /// Create a poller with the default interval and no timeout.
    pub fn new(
        runner: &'a R,
        apple_id: impl Into<String>,
        password: impl Into<String>,
        bundle_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            parser: NotarizationParser::new()?,
            apple_id: apple_id.into(),
            password: password.into(),
            bundle_id: bundle_id.into(),
            interval: DEFAULT_INTERVAL,
            timeout: None,
        })
    }

    /// Delay between status checks.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up once polling has taken this long.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload `artifact` and return the request id.
    ///
    /// The primary bundle id gets the current unix time appended so repeated
    /// submissions of the same version are accepted.
    pub async fn submit(&self, artifact: &Path) -> Result<String> {
        let command = format!(
            "xcrun altool --notarize-app --primary-bundle-id \"{}.{}\" -u {} --password {} --file \"{}\"",
            self.bundle_id,
            chrono::Utc::now().timestamp(),
            self.apple_id,
            self.password,
            artifact.display()
        );
        let output = self
            .runner
            .checked(&command, "There was a problem submitting the file for notarization.")
            .await?;

        self.parser.request_id(&output).ok_or_else(|| Error::Parse {
            tool: "altool".into(),
            what: "notarization request id".into(),
            output,
        })
    }

    /// Check the status of `request_id` once.
    ///
    /// A failed status check or output without a status line counts as still
    /// in progress; the service commonly lags behind a fresh submission.
    pub async fn status(&self, request_id: &str) -> Result<NotarizationStatus> {
        let command = format!(
            "xcrun altool --notarization-info {} -u {} --password {}",
            request_id, self.apple_id, self.password
        );
        let output = self.runner.run(&command).await?;
        if !output.success() {
            log::warn!(
                "notarization status check for {} exited with {}, retrying",
                request_id,
                output.code
            );
            return Ok(NotarizationStatus::InProgress);
        }

        match self.parser.status(&output.text)? {
            Some(status) => Ok(status),
            None => {
                log::warn!("no status reported for {} yet", request_id);
                Ok(NotarizationStatus::InProgress)
            }
        }
    }

    /// Poll `request_id` until it reaches a terminal status or the timeout expires.
    pub async fn poll(&self, request_id: &str) -> Result<NotarizationOutcome> {
        let started = Instant::now();
        let mut waits = 0;

        loop {
            let status = self.status(request_id).await?;
            if status.is_terminal() {
                log::debug!("notarization {} finished: {}", request_id, status);
                return Ok(NotarizationOutcome {
                    request_id: request_id.to_string(),
                    status,
                    waits,
                });
            }

            let elapsed = started.elapsed();
            if let Some(timeout) = self.timeout
                && elapsed >= timeout
            {
                return Err(Error::NotarizationTimeout {
                    request_id: request_id.to_string(),
                    elapsed,
                });
            }

            tokio::time::sleep(self.interval).await;
            waits += 1;
        }
    }

    /// Submit `artifact` and wait for a successful verdict.
    pub async fn notarize(&self, artifact: &Path) -> Result<NotarizationOutcome> {
        let request_id = self.submit(artifact).await?;
        log::info!("Notarization request {} submitted", request_id);

        let outcome = self.poll(&request_id).await?;
        if outcome.status != NotarizationStatus::Success {
            return Err(Error::NotarizationRejected {
                artifact: artifact.display().to_string(),
                status: outcome.status.to_string(),
            });
        }

        log::info!("✓ Notarized {}", artifact.display());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::executor::scripted::ScriptedRunner;

    const UUID: &str = "2e1f6c3a-9b8d-4c7e-a1f0-5d6b7c8e9f01";

    fn submitted() -> String {
        format!("No errors uploading 'Pingnoo.zip'.\nRequestUUID = {UUID}\n")
    }

    fn info(status: &str) -> String {
        format!(
            "No errors getting notarization info.\n\n          Date: 2021-03-15 10:00:00 +0000\n          Hash: abc\n    RequestUUID: {UUID}\n        Status: {status}\n   Status Code: 0\nStatus Message: Package Approved\n"
        )
    }

    fn poller(runner: &ScriptedRunner) -> NotarizationPoller<'_, ScriptedRunner> {
        NotarizationPoller::new(runner, "dev@example.com", "secret", "com.nedrysoft.pingnoo")
            .unwrap()
            .interval(Duration::ZERO)
    }

    #[test]
    fn parses_request_id_and_status() {
        let parser = NotarizationParser::new().unwrap();
        assert_eq!(parser.request_id(&submitted()).as_deref(), Some(UUID));
        assert_eq!(parser.request_id("Error: unable to upload"), None);
        assert_eq!(
            parser.status(&info("in progress")).unwrap(),
            Some(NotarizationStatus::InProgress)
        );
        assert_eq!(parser.status("nothing here").unwrap(), None);
        assert!(parser.status(&info("exploded")).is_err());
    }

    #[tokio::test]
    async fn polls_until_success() {
        let runner = ScriptedRunner::new()
            .respond("--notarize-app", 0, &submitted())
            .respond("--notarization-info", 0, &info("in progress"))
            .respond("--notarization-info", 0, &info("in progress"))
            .respond("--notarization-info", 0, &info("success"));

        let outcome = poller(&runner).notarize(Path::new("Pingnoo.zip")).await.unwrap();
        assert_eq!(outcome.status, NotarizationStatus::Success);
        assert_eq!(outcome.waits, 2);
        assert_eq!(outcome.request_id, UUID);
        assert_eq!(runner.count("--notarization-info"), 3);
    }

    #[tokio::test]
    async fn missing_request_id_fails_without_polling() {
        let runner = ScriptedRunner::new().respond("--notarize-app", 0, "upload finished\n");
        let err = poller(&runner).notarize(Path::new("Pingnoo.zip")).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(runner.count("--notarization-info"), 0);
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let runner = ScriptedRunner::new()
            .respond("--notarize-app", 0, &submitted())
            .respond("--notarization-info", 0, &info("invalid"));
        let err = poller(&runner).notarize(Path::new("Pingnoo.dmg")).await.unwrap_err();
        match err {
            Error::NotarizationRejected { artifact, status } => {
                assert_eq!(artifact, "Pingnoo.dmg");
                assert_eq!(status, "invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_status_checks_keep_polling() {
        let runner = ScriptedRunner::new()
            .respond("--notarization-info", 1, "could not reach server\n")
            .respond("--notarization-info", 0, "No errors getting notarization info.\n")
            .respond("--notarization-info", 0, &info("success"));
        let outcome = poller(&runner).poll(UUID).await.unwrap();
        assert_eq!(outcome.waits, 2);
    }

    #[tokio::test]
    async fn stuck_request_times_out() {
        let runner =
            ScriptedRunner::new().respond_always("--notarization-info", 0, &info("in progress"));
        let err = poller(&runner)
            .timeout(Some(Duration::ZERO))
            .poll(UUID)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotarizationTimeout { .. }));
    }

    #[tokio::test]
    async fn submission_uses_timestamped_bundle_id() {
        let runner = ScriptedRunner::new()
            .respond("--notarize-app", 0, &submitted())
            .respond("--notarization-info", 0, &info("success"));
        poller(&runner).notarize(Path::new("Pingnoo.zip")).await.unwrap();
        let submit = &runner.commands()[0];
        assert!(submit.contains("--primary-bundle-id \"com.nedrysoft.pingnoo."));
        assert!(submit.contains("--file \"Pingnoo.zip\""));
    }
}
