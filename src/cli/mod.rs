//! Command-line interface for codegraph.
//!
//! This module handles argument parsing only. No logic or store
//! operations are performed here; the binary dispatches to the library.

use clap::Parser;
use std::path::PathBuf;

/// codegraph: extract a typed property graph from a source tree.
#[derive(Parser, Debug)]
#[command(name = "codegraph")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit config file (default: walk up for codegraph.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available codegraph commands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Create the store and write the config file.
    Init {
        /// Project root (default: current directory).
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,
    },

    /// Run the incremental engine over the project (or a subtree).
    Update {
        /// Treat everything as modified: drop the store contents first.
        #[arg(long)]
        full: bool,

        /// Restrict the update to a subtree.
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,
    },

    /// Run a one-shot read-only query.
    Query {
        /// Cypher query text.
        query: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Cap the number of rows printed.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print entity counts per kind and store health.
    Status,

    /// Delete the store directory (the supported reset operation).
    Reset,
}

/// Query output formats.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned ASCII table.
    Table,
    /// JSON array of row objects.
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

/// Parse CLI arguments from the environment.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_flags_parse() {
        let cli = Cli::try_parse_from(["codegraph", "update", "--full", "--path", "src"]).unwrap();
        match cli.command {
            Commands::Update { full, path } => {
                assert!(full);
                assert_eq!(path, Some(PathBuf::from("src")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn query_defaults_to_table() {
        let cli = Cli::try_parse_from(["codegraph", "query", "MATCH (n) RETURN n"]).unwrap();
        match cli.command {
            Commands::Query { format, limit, .. } => {
                assert_eq!(format, OutputFormat::Table);
                assert!(limit.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
