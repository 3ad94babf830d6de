//! CLI argument definitions using clap
//!
//! Commands:
//! - ovcore --config <path> check-schemas
//! - ovcore --config <path> materialize --object-type <T> [--user U] [--role R ...]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ovcore - schema-driven object validation and versioning
#[derive(Parser, Debug)]
#[command(name = "ovcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./ovcore.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Load every schema file and list the registered object types
    CheckSchemas,

    /// Materialize a JSON payload read from stdin as a new object (dry run)
    Materialize {
        /// Object type to materialize
        #[arg(long)]
        object_type: String,

        /// Caller identity stamped into the audit attributes
        #[arg(long, default_value = "cli")]
        user: String,

        /// Caller role, repeatable
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
