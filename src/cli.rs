//! CLI arguments and subcommands for herakles-metrics-agent.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use herakles_metrics_agent::collectors::{CPU, DISK, MEMORY};
use herakles_metrics_agent::config::ConfigFormat;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Collectors that can be switched on from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectorName {
    Cpu,
    Memory,
    Disk,
}

impl CollectorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorName::Cpu => CPU,
            CollectorName::Memory => MEMORY,
            CollectorName::Disk => DISK,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-metrics-agent",
    about = "Host metrics agent sampling CPU, memory and disk usage",
    long_about = "Host metrics agent sampling CPU, memory and disk usage.\n\n\
                  Runs one collector task per enabled resource domain, buffers the \
                  resulting metric points in a bounded queue and reports them on a \
                  fixed collection interval.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Reporting interval, e.g. "15s" (overrides config)
    #[arg(short = 'i', long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Points per reported batch (overrides config)
    #[arg(long)]
    pub batch_size: Option<u8>,

    /// Enable a collector (repeatable)
    #[arg(long, value_enum)]
    pub enable: Vec<CollectorName>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one sampling pass and print the points as JSON
    Probe {
        /// Only probe this collector
        #[arg(long, value_enum)]
        collector: Option<CollectorName>,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
