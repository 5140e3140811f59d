//! Common test utilities for CLI testing.

use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

/// A scratch project directory; the database lands in `warden.db` inside it.
pub struct TestContext {
    pub temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a command configured for this context
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("warden").expect("Binary not found");
        cmd.current_dir(self.path())
            .env_remove("WARDEN_CONFIG_PATH")
            .env_remove("WARDEN_DATABASE_PATH")
            .env("WARDEN_LOG_LEVEL", "error");
        cmd
    }

    /// Run `warden <args>` and capture the output.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("Failed to run warden")
    }

    /// Run `warden <args>` and require success.
    pub fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        output.assert_success();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert helpers for CLI output
pub trait OutputAssertions {
    fn assert_success(&self);
    fn assert_stdout_contains(&self, text: &str);
    fn assert_stderr_contains(&self, text: &str);
    fn assert_exit_code(&self, code: i32);
}

impl OutputAssertions for Output {
    fn assert_success(&self) {
        assert!(
            self.status.success(),
            "Command failed with status: {}\nstderr: {}",
            self.status,
            String::from_utf8_lossy(&self.stderr)
        );
    }

    fn assert_stdout_contains(&self, text: &str) {
        let stdout = String::from_utf8_lossy(&self.stdout);
        assert!(stdout.contains(text), "stdout did not contain '{text}'\nstdout: {stdout}");
    }

    fn assert_stderr_contains(&self, text: &str) {
        let stderr = String::from_utf8_lossy(&self.stderr);
        assert!(stderr.contains(text), "stderr did not contain '{text}'\nstderr: {stderr}");
    }

    fn assert_exit_code(&self, code: i32) {
        assert_eq!(
            self.status.code(),
            Some(code),
            "Expected exit code {}, got {:?}",
            code,
            self.status.code()
        );
    }
}
