//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for one subcommand plus
//! the pure helpers it is built from.

pub mod clean;
pub mod config;
pub mod diff;
pub mod init;
pub mod run;

pub use clean::execute_clean;
pub use config::{execute_config, resolve_config, DEFAULT_CONFIG_FILE};
pub use diff::{diff_options, execute_diff};
pub use init::{default_config_yaml, execute_init};
pub use run::{apply_overrides, browser_options, execute_run};

use crate::error::{CliError, CliResult};

/// Runtime for the async library calls
pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create async runtime: {e}")))
}
