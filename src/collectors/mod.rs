//! Collectors for host metrics.
//!
//! Each collector samples one resource domain (CPU, memory, disk) through a
//! [`Platform`] and emits batches of [`MetricPoint`]s. All of them share the
//! timer loop in [`base::BaseCollector`]; only the sampling pass differs.

pub mod base;
pub mod cpu;
pub mod disk;
pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::CollectionConfig;
use crate::error::CollectorError;
use crate::metric::MetricPoint;
use crate::platform::Platform;

pub use base::{BaseCollector, CollectorState};
pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use memory::MemoryCollector;

/// Registry key of the CPU collector.
pub const CPU: &str = "cpu";
/// Registry key of the memory collector.
pub const MEMORY: &str = "memory";
/// Registry key of the disk collector.
pub const DISK: &str = "disk";

/// Points produced by one collector on one tick.
pub type Batch = Vec<MetricPoint>;

/// Boxed future returned by [`Collector::start`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An independently scheduled sampling unit.
pub trait Collector: Send + Sync {
    /// Registry name, used for lookup and logging.
    fn name(&self) -> &str;

    /// One synchronous sampling pass. Any failed read aborts the whole batch.
    fn collect(&self) -> Result<Batch, CollectorError>;

    /// Runs the polling loop until `ctx` or [`Collector::stop`] cancels it.
    ///
    /// Each tick calls [`Collector::collect`] and sends the batch to `output`,
    /// waiting while the queue is full. Sampling errors are logged and the
    /// tick is skipped. May be called once per collector.
    fn start(
        &self,
        ctx: CancellationToken,
        output: mpsc::Sender<Batch>,
    ) -> BoxFuture<'_, Result<(), CollectorError>>;

    /// Signals the collector's own cancellation. Idempotent.
    fn stop(&self) -> Result<(), CollectorError>;

    /// Polling period, fixed at construction.
    fn interval(&self) -> Duration;

    fn state(&self) -> CollectorState;
}

/// Builds every collector enabled in `config`, keyed by registry name.
pub fn build_collectors(
    config: &CollectionConfig,
    platform: Arc<dyn Platform>,
) -> Vec<(&'static str, Arc<dyn Collector>)> {
    let collectors = &config.collectors;
    let mut built: Vec<(&'static str, Arc<dyn Collector>)> = Vec::new();

    if collectors.cpu.enabled {
        built.push((
            CPU,
            Arc::new(CpuCollector::from_config(&collectors.cpu, platform.clone())),
        ));
    }
    if collectors.memory.enabled {
        built.push((
            MEMORY,
            Arc::new(MemoryCollector::from_config(
                &collectors.memory,
                platform.clone(),
            )),
        ));
    }
    if collectors.disk.enabled {
        built.push((
            DISK,
            Arc::new(DiskCollector::from_config(&collectors.disk, platform)),
        ));
    }

    built
}
