//! Baton: hand coding tasks to a remote agent through GitHub and bring the
//! results back.
//!
//! This is the main entry point for the `baton` CLI. It parses arguments,
//! loads configuration, dispatches to the appropriate command handler, and
//! maps outcomes and errors to exit codes.

mod cli;
mod commands;
pub mod announce;
pub mod best_effort;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod git;
pub mod logging;
pub mod poll;
pub mod provision;
pub mod publish;
pub mod remote;
pub mod sync;
pub mod task;
pub mod working_copy;

#[cfg(test)]
mod test_support;

use cli::Cli;
use config::Config;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let result = Config::resolve(cli.config.as_deref())
        .and_then(|config| commands::dispatch(cli.command, &config));

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
