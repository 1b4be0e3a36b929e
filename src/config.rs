//! Configuration management for herakles-metrics-agent.
//!
//! This module handles loading and validating the collection settings from
//! YAML, JSON or TOML files. Durations are written in humantime notation
//! (`"15s"`, `"1m30s"`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "METRICS_AGENT_CONFIG";

/// Locations tried when neither `--config` nor the environment names a file.
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./agent.yaml",
    "./agent.yml",
    "/etc/herakles/metrics-agent.yaml",
];

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Format implied by a file extension; YAML unless `.json` or `.toml`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Serde adapter for humantime durations.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Maximum points handed to the reporter in one chunk (1-255)
    pub batch_size: u8,

    /// Reporting tick
    #[serde(with = "duration_str")]
    pub interval: Duration,

    pub collectors: CollectorsConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval: Duration::from_secs(15),
            collectors: CollectorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    pub cpu: CpuCollectorConfig,
    pub memory: CollectorConfig,
    pub disk: DiskCollectorConfig,
}

/// Settings shared by every collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    #[serde(with = "duration_str")]
    pub interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuCollectorConfig {
    pub enabled: bool,
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Also report thermal sensor readings
    pub include_temps: bool,
}

impl Default for CpuCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
            include_temps: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskCollectorConfig {
    pub enabled: bool,
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Mount paths to skip, compared by exact string equality
    pub ignore_paths: Vec<String>,
}

impl Default for DiskCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
            ignore_paths: vec!["/proc".into(), "/sys".into(), "/dev".into()],
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    let collection = &cfg.collection;

    if collection.batch_size == 0 {
        return Err(ConfigError::Invalid(
            "batch size must be between 1 and 255".into(),
        ));
    }

    if collection.interval.is_zero() {
        return Err(ConfigError::Invalid(
            "collection interval must be positive".into(),
        ));
    }

    let collectors = &collection.collectors;
    let enabled_intervals = [
        ("CPU", collectors.cpu.enabled, collectors.cpu.interval),
        ("Memory", collectors.memory.enabled, collectors.memory.interval),
        ("Disk", collectors.disk.enabled, collectors.disk.interval),
    ];
    for (name, enabled, interval) in enabled_intervals {
        if enabled && interval.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "{} collector interval must be positive",
                name
            )));
        }
    }

    Ok(())
}

/// Picks the config file to load: explicit path, then the environment
/// value, then the first existing default location. A non-blank environment
/// value wins over `./agent.yaml` even when that file exists.
pub fn resolve_config_path(explicit: Option<&Path>, env_value: Option<String>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Parses a config document in the given format.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, String> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    }
}

/// Loads the configuration, falling back to defaults when no file is found.
///
/// An explicitly named file (argument or environment) must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = resolve_config_path(explicit, std::env::var(CONFIG_ENV).ok()) else {
        info!("No configuration file found, using defaults");
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    let format = ConfigFormat::from_path(&path);
    let config = parse_config(&content, format).map_err(|detail| ConfigError::Parse {
        path: path.clone(),
        detail,
    })?;
    info!("Loaded {:?} configuration from: {}", format, path.display());
    Ok(config)
}

/// Renders configuration in requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(config).map_err(|e| ConfigError::Render(e.to_string()))
        }
    }
}
