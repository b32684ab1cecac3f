//! CLI module for cursordb
//!
//! Provides command-line interface for:
//! - query: run one JSON query request against a configured database
//! - count: print the record count of one table

mod args;
mod commands;
mod errors;
mod io;
mod request;

pub use args::{Cli, Command};
pub use commands::{count, query, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};
pub use request::{LimitSpec, Pending, QueryRequest};

use tracing_subscriber::EnvFilter;

/// Parse arguments, install logging and run the command
pub fn run() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Logs go to stderr so stdout stays a single JSON document
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
