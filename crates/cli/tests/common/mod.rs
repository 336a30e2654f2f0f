//! Helpers for running the dwatch binary in tests

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// dwatch invocation builder
pub struct DwatchCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl DwatchCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Run to completion and capture output with timing
    pub fn execute(&self) -> CommandResult {
        let start = Instant::now();
        let output = Command::new(env!("CARGO_BIN_EXE_dwatch"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute dwatch");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        }
    }

    pub fn assert_success(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            result.success(),
            "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
            result.exit_code,
            self.args,
            result.stdout,
            result.stderr
        );
        result
    }

    pub fn assert_failure(&self) -> CommandResult {
        let result = self.execute();
        assert!(
            !result.success(),
            "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
            self.args,
            result.stdout
        );
        result
    }
}

/// Captured result of one run
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Usage:
/// ```ignore
/// dwatch!(dir, "--backend", "reload").assert_success();
/// ```
#[macro_export]
macro_rules! dwatch {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::DwatchCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
