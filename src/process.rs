//! External process invocation.
//!
//! Git and Cargo are opaque collaborators: kiln only hands them a directory and
//! looks at the exit status and output. [`ProcessRunner`] is the seam that lets
//! the installer be tested with canned results.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::KilnError;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was killed by a signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Turn a non-zero exit into [`KilnError::ProcessFailed`].
    pub fn check(self, program: &str, args: &[String]) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(KilnError::ProcessFailed {
            command: display_command(program, args),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
        .into())
    }

    /// stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ProcessRunner {
    /// Run `program` to completion with captured output. A non-zero exit is
    /// reported in [`ProcessOutput::status`], not as an error; `Err` means the
    /// process could not be started at all.
    fn run(&self, program: &str, args: &[String], work_dir: &Path) -> Result<ProcessOutput>;

    /// Run `program` attached to the current terminal and return its exit code.
    fn run_interactive(&self, program: &Path, args: &[String]) -> Result<i32>;
}

pub struct RealProcessRunner;

impl ProcessRunner for RealProcessRunner {
    #[tracing::instrument(skip(self))]
    fn run(&self, program: &str, args: &[String], work_dir: &Path) -> Result<ProcessOutput> {
        debug!("Running {}", display_command(program, args));

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null());

        let output = command
            .output()
            .with_context(|| format!("Failed to start `{}`", program))?;

        Ok(ProcessOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    #[tracing::instrument(skip(self))]
    fn run_interactive(&self, program: &Path, args: &[String]) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to start {:?}", program))?;
        Ok(status.code().unwrap_or(-1))
    }
}

pub(crate) fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Build an owned argument list from string literals and values.
pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_success_through() {
        let output = ProcessOutput::success("ok\n");
        let checked = output.clone().check("git", &args(["status"])).unwrap();
        assert_eq!(checked, output);
    }

    #[test]
    fn test_check_reports_failure() {
        let output = ProcessOutput::failure(128, "fatal: repository not found\n");
        let err = output
            .check("git", &args(["ls-remote", "https://example.com/x"]))
            .unwrap_err();

        match err.downcast_ref::<KilnError>() {
            Some(KilnError::ProcessFailed {
                command,
                status,
                stderr,
            }) => {
                assert_eq!(command, "git ls-remote https://example.com/x");
                assert_eq!(*status, 128);
                assert_eq!(stderr, "fatal: repository not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let mut output = ProcessOutput::failure(1, "  error[E0425]  ");
        output.stdout = "Compiling tool".into();
        assert_eq!(output.diagnostics(), "error[E0425]");

        output.stderr.clear();
        assert_eq!(output.diagnostics(), "Compiling tool");
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_captures_output_and_status() {
        let runner = RealProcessRunner;
        let dir = tempfile::tempdir().unwrap();

        let output = runner
            .run("sh", &args(["-c", "pwd; echo oops >&2; exit 3"]), dir.path())
            .unwrap();

        assert_eq!(output.status, 3);
        assert!(!output.is_success());
        assert_eq!(output.stderr.trim(), "oops");
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_real_runner_missing_program_is_error() {
        let runner = RealProcessRunner;
        let result = runner.run(
            "kiln-definitely-not-a-real-program",
            &[],
            Path::new("."),
        );
        assert!(result.is_err());
    }
}
