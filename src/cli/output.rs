//! Colored terminal output for deployment runs
//!
//! Provides consistent, colored CLI output and the step printer that wraps
//! each deployment operation in a `> message [✓]` line.

use crate::bundler::{Error, Result};
use std::{future::Future, io::Write, time::Duration};
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

/// Marker printed after a step that succeeded.
fn tick() -> &'static str {
    if cfg!(windows) { "Y" } else { "✓" }
}

/// Marker printed after a step that failed.
fn cross() -> &'static str {
    if cfg!(windows) { "N" } else { "✘" }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    /// Run `operation` as a named step.
    ///
    /// Prints `> message ` before and `[✓]` or `[✘]` after. An expected
    /// failure is printed as `ERROR: ...` and comes back as
    /// [`Error::Reported`] so the caller exits without printing it again.
    /// Internal errors, and errors a nested step already reported, are
    /// returned unchanged.
    pub async fn step<T, F>(&self, message: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.print_start(message, false);
        let result = operation.await;
        self.settle(result)
    }

    /// [`step`](Self::step) for a tool that writes to the terminal itself.
    ///
    /// The `> message` line is ended before the tool runs and printed again
    /// with its marker once it finishes, so the tool's output sits between
    /// the two.
    pub async fn streamed_step<T, F>(&self, message: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.print_start(message, true);
        let result = operation.await;
        self.print_start(message, false);
        self.settle(result)
    }

    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.step_end(true);
                Ok(value)
            }
            Err(e) => {
                self.step_end(false);
                if e.is_reported() || !e.is_expected() {
                    return Err(e);
                }
                self.failure(&e.to_string());
                Err(Error::Reported(Box::new(e)))
            }
        }
    }

    fn print_start(&self, message: &str, end_line: bool) {
        if self.quiet {
            return;
        }
        let _ = self.bufwtr.print(&self.start_line(message, end_line));
    }

    fn start_line(&self, message: &str, end_line: bool) -> Buffer {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_bold(true));
        if end_line {
            let _ = write!(&mut buffer, "> {}", message);
            let _ = buffer.reset();
            let _ = writeln!(&mut buffer);
        } else {
            let _ = write!(&mut buffer, "> {} ", message);
            let _ = buffer.reset();
        }
        buffer
    }

    fn step_end(&self, ok: bool) {
        if self.quiet {
            return;
        }
        let (color, marker) = if ok {
            (Color::Green, tick())
        } else {
            (Color::Red, cross())
        };
        let mut buffer = self.bufwtr.buffer();
        let _ = write!(&mut buffer, "[");
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(&mut buffer, "{}", marker);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, "]");
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print `ERROR: message` to stdout, below the failed step (always shown)
    fn failure(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(&mut buffer, "ERROR:");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        if self.bufwtr.print(&buffer).is_err() {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print the start banner with the local time
    pub fn start_banner(&self, title: &str) {
        let now = chrono::Local::now();
        let _ = self.section(title);
        let _ = self.println(&format!(
            "Deployment process started at {}",
            now.format("%H:%M:%S on %d/%m/%Y")
        ));
        let _ = self.println("");
    }

    /// Print the final summary for a finished deployment
    pub fn finished(&self, artifact: &str, elapsed: Duration) {
        let _ = self.println("");
        let _ = self.success(&format!("Finished! {} is ready for distribution.", artifact));
        let _ = self.println(&format!(
            "Total time taken to perform deployment was {}.",
            format_elapsed(elapsed)
        ));
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(&mut buffer, "{}", tick());
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(&mut buffer, "{}", cross());
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        if bufwtr.print(&buffer).is_err() {
            eprintln!("{} {}", cross(), message);
        }
    }

    /// Print a detail line, only with `--verbose`
    pub fn detail(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Blue)));
        let _ = write!(&mut buffer, "  ·");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print a banner title
    fn section(&self, title: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(&mut buffer, "{}", title);
        let _ = writeln!(&mut buffer, "{}", "=".repeat(title.chars().count()));
        let _ = buffer.reset();
        self.bufwtr.print(&buffer)
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "    {}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        self.bufwtr.print(&buffer)
    }
}

/// Format a duration as `1d2h3m4s`, omitting leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);

    if days > 0 {
        format!("{days}d{hours}h{minutes}m{seconds}s")
    } else if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_drops_leading_zero_units() {
        assert_eq!(format_elapsed(Duration::from_secs(4)), "4s");
        assert_eq!(format_elapsed(Duration::from_secs(184)), "3m4s");
        assert_eq!(format_elapsed(Duration::from_secs(7_384)), "2h3m4s");
        assert_eq!(format_elapsed(Duration::from_secs(93_784)), "1d2h3m4s");
        assert_eq!(format_elapsed(Duration::from_secs(3_600)), "1h0m0s");
    }

    #[tokio::test]
    async fn step_passes_values_through() {
        let output = OutputManager::new(false, true);
        let value = output.step("Checking", async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn expected_failures_are_reported_once() {
        let output = OutputManager::new(false, true);
        let err = output
            .step::<(), _>("Building", async {
                Err(Error::ToolFailed {
                    message: "dpkg-deb failed".into(),
                    output: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(err.is_reported());

        // An enclosing step leaves it alone.
        let outer = output.step::<(), _>("Outer", async { Err(err) }).await.unwrap_err();
        match outer {
            Error::Reported(inner) => assert!(matches!(*inner, Error::ToolFailed { .. })),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn streamed_start_line_is_terminated() {
        let output = OutputManager::new(false, false);
        let streamed = String::from_utf8_lossy(output.start_line("Building fedora-33", true).as_slice())
            .into_owned();
        assert!(streamed.contains("> Building fedora-33"));
        assert!(streamed.ends_with('\n'));

        let inline = String::from_utf8_lossy(output.start_line("Building fedora-33", false).as_slice())
            .into_owned();
        assert!(inline.contains("> Building fedora-33 "));
        assert!(!inline.contains('\n'));
    }

    #[tokio::test]
    async fn streamed_step_reports_failures_like_step() {
        let output = OutputManager::new(false, true);
        let err = output
            .streamed_step::<(), _>("Pushing registry.example.com/fedora-33", async {
                Err(Error::ToolFailed {
                    message: "error pushing the docker image.".into(),
                    output: String::new(),
                })
            })
            .await
            .unwrap_err();
        assert!(err.is_reported());
    }

    #[tokio::test]
    async fn internal_errors_propagate_unchanged() {
        let output = OutputManager::new(false, true);
        let err = output
            .step::<(), _>("Staging", async { Err(Error::Internal("bug".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
