//! CLI command implementations for ocserv-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and occtl validation
//! - `config`: Configuration file generation
//! - `test`: One-off occtl queries with decoded output

pub mod check;
pub mod config;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
