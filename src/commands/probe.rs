//! Probe command implementation.
//!
//! Runs one ad-hoc sampling pass per collector and prints the points.

use std::collections::BTreeMap;
use std::sync::Arc;

use herakles_metrics_agent::collectors::build_collectors;
use herakles_metrics_agent::config::CollectionConfig;
use herakles_metrics_agent::{LinuxPlatform, Manager, MetricPoint, Platform};

use crate::cli::CollectorName;

/// Samples the enabled collectors once and prints the points as JSON.
pub fn command_probe(
    config: &CollectionConfig,
    collector: Option<CollectorName>,
) -> anyhow::Result<()> {
    let platform = Arc::new(LinuxPlatform::new());
    let results = probe_collectors(config, platform, collector)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Collects once from each selected collector, keyed by collector name.
///
/// With nothing enabled in `config`, every collector is probed.
pub fn probe_collectors(
    config: &CollectionConfig,
    platform: Arc<dyn Platform>,
    only: Option<CollectorName>,
) -> anyhow::Result<BTreeMap<String, Vec<MetricPoint>>> {
    let mut config = config.clone();
    let collectors = &mut config.collectors;
    if let Some(name) = only {
        match name {
            CollectorName::Cpu => collectors.cpu.enabled = true,
            CollectorName::Memory => collectors.memory.enabled = true,
            CollectorName::Disk => collectors.disk.enabled = true,
        }
    } else if !collectors.cpu.enabled && !collectors.memory.enabled && !collectors.disk.enabled {
        collectors.cpu.enabled = true;
        collectors.memory.enabled = true;
        collectors.disk.enabled = true;
    }

    let manager = Manager::with_capacity(1);
    for (name, collector) in build_collectors(&config, platform) {
        manager.register_collector(name, collector)?;
    }

    let names = match only {
        Some(name) => vec![name.as_str().to_string()],
        None => manager.collector_names(),
    };

    let mut results = BTreeMap::new();
    for name in names {
        let points = manager.probe(&name)?;
        results.insert(name, points);
    }
    Ok(results)
}
