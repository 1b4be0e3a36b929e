//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use herakles_metrics_agent::config::{render_config, Config, ConfigFormat};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(default_file_name(format)),
    };

    let mut content = render_config(&config, format)?;
    if commented && format == ConfigFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn default_file_name(format: ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => "agent.yaml",
        ConfigFormat::Json => "agent.json",
        ConfigFormat::Toml => "agent.toml",
    }
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Metrics Agent Configuration
# ====================================
#
# Collection
# ----------
# batch_size: 100              # Points per reported batch (1-255)
# interval: 15s                # Reporting interval (humantime: 15s, 1m, 1h30m)
#
# CPU Collector
# -------------
# collectors.cpu.enabled: false
# collectors.cpu.interval: 1m
# collectors.cpu.include_temps: false   # Also report thermal sensors
#
# Memory Collector
# ----------------
# collectors.memory.enabled: false
# collectors.memory.interval: 10s
#
# Disk Collector
# --------------
# collectors.disk.enabled: false
# collectors.disk.interval: 1m
# collectors.disk.ignore_paths: ["/proc", "/sys", "/dev"]  # Exact mount paths
"#;

    format!("{comments}\n{yaml}")
}
