//! Test utilities for Warden crates.

use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Writes `yaml` to `.warden/config.yaml` inside a fresh temp directory.
///
/// Returns the directory (keep it alive) and the config file path.
pub fn temp_config(yaml: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let config_dir = dir.path().join(".warden");
    std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    let path = config_dir.join("config.yaml");
    std::fs::write(&path, yaml).expect("Failed to write config file");
    (dir, path)
}

/// Path for a throwaway SQLite database inside `dir`.
pub fn temp_db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("warden-test.db")
}

static TRACING: Once = Once::new();

/// Route tracing output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
