//! Warden command line interface.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use commands::run;
pub use error::CliError;
