//! CLI module
//!
//! Command-line driver for the client.
//!
//! # Commands
//!
//! - `get` - Perform one call and print the body
//! - `list` - Stream a paginated collection as JSON lines
//! - `batch-write` - Write records from a file in chunks
//! - `config` - Show the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
