//! CLI command implementations for herakles-metrics-agent.
//!
//! This module provides implementations for all CLI subcommands:
//! - `probe`: One-shot sampling pass printed as JSON
//! - `config`: Configuration file generation

pub mod config;
pub mod probe;

// Re-export command functions
pub use config::command_config;
pub use probe::command_probe;
