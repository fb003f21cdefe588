//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line driver for the orgpager client
#[derive(Parser, Debug)]
#[command(name = "orgpager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Perform a single GET and print the response body
    Get {
        /// Path template, e.g. /orgs/{org_id}/devices/{device_id}
        path: String,

        /// Query parameter (key=value, repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,

        /// Path parameter (key=value, repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        param: Vec<String>,
    },

    /// Stream every item of a paginated collection, one JSON document per line
    List {
        /// Path template, e.g. /orgs/{org_id}/devices
        path: String,

        /// Query parameter (key=value, repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,

        /// Path parameter (key=value, repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        param: Vec<String>,

        /// Dotted path of the item array in each response
        #[arg(long)]
        items_path: Option<String>,

        /// Stop after this many items
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Write a JSON array of records in chunks
    BatchWrite {
        /// Path template of the batch endpoint
        path: String,

        /// File containing a JSON array of records
        #[arg(long)]
        file: PathBuf,

        /// HTTP method for chunk requests
        #[arg(long, default_value = "POST")]
        method: String,

        /// Path parameter (key=value, repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        param: Vec<String>,

        /// Items per request (capped at 1000)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Print the effective configuration (token redacted)
    Config,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from([
            "orgpager",
            "list",
            "/orgs/{org_id}/devices",
            "-q",
            "status=active",
            "--max-items",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::List {
                path,
                query,
                max_items,
                ..
            } => {
                assert_eq!(path, "/orgs/{org_id}/devices");
                assert_eq!(query, vec!["status=active".to_string()]);
                assert_eq!(max_items, Some(10));
            }
            other => panic!("Expected List, got {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_batch_write() {
        let cli = Cli::try_parse_from([
            "orgpager",
            "--verbose",
            "batch-write",
            "/orgs/{org_id}/devices/batch",
            "--file",
            "devices.json",
            "--chunk-size",
            "500",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::BatchWrite { chunk_size: Some(500), ref method, .. } if method == "POST"
        ));
    }
}
