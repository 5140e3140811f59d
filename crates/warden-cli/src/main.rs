//! Warden CLI - role-based access control administration
//!
//! Main entry point for the `warden` binary.

use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use tracing::debug;
use warden_cli::{run, Cli, CliError};
use warden_common_config::Environment;
use warden_common_log::{LogConfig, LogLevel};

fn main() -> ExitCode {
    if let Err(e) = Environment::init() {
        eprintln!("warning: {e}");
    }
    let cli = Cli::parse();

    init_tracing(&cli);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(run(cli)));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let CliError::Denied { output } = &e {
                println!("{output}");
            } else {
                debug!(code = e.code(), error = %e, "command failed");
                eprintln!("error[{}]: {e}", e.code());
            }
            e.exit_code()
        }
    }
}

/// `WARDEN_LOG_*` settings, with the level taken from `-v`/`-q` when given.
fn init_tracing(cli: &Cli) {
    let mut config = LogConfig::from_env();

    config.level = match cli.verbose {
        0 if cli.quiet => LogLevel::Error,
        0 if std::env::var_os("WARDEN_LOG_LEVEL").is_some() => config.level,
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    if let Err(e) = warden_common_log::init(config) {
        eprintln!("warning: {e}");
    }
}
