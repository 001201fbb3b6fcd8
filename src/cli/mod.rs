//! CLI module for sts-wire.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - Cleaning up instance folders and the cached executable
//! - Listing and printing diagnostic reports
//!
//! # Usage
//!
//! The CLI dispatcher is called early in main() to handle subcommands
//! before a session is started:
//!
//! ```ignore
//! use sts_wire::cli::{parse_args, run_cli_command, CliCommand};
//!
//! let command = parse_args(std::env::args())?;
//! if let Some(result) = run_cli_command(&command, &base_dir, &cache_dir) {
//!     // CLI command was executed, exit with result
//! }
//! // CliCommand::Run, continue to the session
//! ```

pub mod args;
pub mod clean;
pub mod report;
pub mod version;

pub use args::{parse_args, CliCommand, RunArgs, USAGE};
pub use clean::handle_clean_command;
pub use report::handle_report_command;
pub use version::{handle_version_command, version_block, VERSION};

use std::path::Path;

use color_eyre::Result;

/// Run a CLI command if applicable.
///
/// # Returns
///
/// * `None` - If the command is `Run` (a session must be started)
/// * `Some(Ok(()))` - If a CLI command executed successfully
/// * `Some(Err(e))` - If a CLI command failed
///
/// # Note
///
/// The `Version` command never returns as it calls `std::process::exit(0)`.
pub fn run_cli_command(
    command: &CliCommand,
    base_dir: &Path,
    cache_dir: &Path,
) -> Option<Result<()>> {
    match command {
        CliCommand::Version => {
            // This function never returns (calls exit)
            handle_version_command();
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Some(Ok(()))
        }
        CliCommand::Clean => Some(handle_clean_command(base_dir, cache_dir)),
        CliCommand::Report(path) => Some(handle_report_command(base_dir, path.clone())),
        CliCommand::Run(_) => None,
    }
}
