//! CLI argument definitions using clap
//!
//! Commands:
//! - cursordb query --config <path> [--request <path>]
//! - cursordb count --config <path> --table <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cursordb - fluent queries over an ordered, indexed record store
#[derive(Parser, Debug)]
#[command(name = "cursordb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one query request and print its result
    Query {
        /// Path to the database configuration file
        #[arg(long, default_value = "./cursordb.json")]
        config: PathBuf,

        /// Path to the request file; read from stdin when omitted
        #[arg(long)]
        request: Option<PathBuf>,
    },

    /// Print the number of records in a table
    Count {
        /// Path to the database configuration file
        #[arg(long, default_value = "./cursordb.json")]
        config: PathBuf,

        /// Table to count
        #[arg(long)]
        table: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_args() {
        let cli = Cli::try_parse_from(["cursordb", "query", "--config", "db.json"]).unwrap();
        match cli.command {
            Command::Query { config, request } => {
                assert_eq!(config, PathBuf::from("db.json"));
                assert!(request.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_count_requires_table() {
        assert!(Cli::try_parse_from(["cursordb", "count"]).is_err());
        let cli = Cli::try_parse_from(["cursordb", "count", "--table", "people"]).unwrap();
        assert!(matches!(cli.command, Command::Count { ref table, .. } if table == "people"));
    }
}
