//! CLI module for ovcore
//!
//! Provides command-line interface for:
//! - check-schemas: Load the schema directory and list object types
//! - materialize: Dry-run create of a payload read from stdin

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_schemas, materialize, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_json};
