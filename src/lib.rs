//! Herakles Metrics Agent Library
//!
//! This library samples host resource counters (CPU, memory, disk) on a
//! per-collector schedule and buffers them as typed [`MetricPoint`]s until a
//! consumer drains them.
//!
//! # Features
//!
//! - **Independent collectors**: each collector runs its own timer loop
//! - **Shared bounded queue**: a slow consumer applies backpressure to every producer
//! - **Typed metric points**: exactly one value per point, checked on access
//! - **Pluggable platform**: `/proc` on Linux, or a scripted fake for tests
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use herakles_metrics_agent::{Manager, MemoryCollector, LinuxPlatform};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Manager::with_capacity(100);
//! let platform = Arc::new(LinuxPlatform::new());
//! manager.register_collector(
//!     "memory",
//!     Arc::new(MemoryCollector::new(Duration::from_secs(10), platform)),
//! )?;
//!
//! let ctx = CancellationToken::new();
//! manager.start(&ctx)?;
//!
//! tokio::time::sleep(Duration::from_secs(11)).await;
//! for point in manager.get_metrics() {
//!     println!("{}", point);
//! }
//!
//! ctx.cancel();
//! manager.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod collectors;
pub mod config;
pub mod error;
pub mod manager;
pub mod metric;
pub mod platform;
pub mod reporter;

// Re-export main types for convenience
pub use collectors::{
    build_collectors, Batch, Collector, CollectorState, CpuCollector, DiskCollector,
    MemoryCollector,
};
pub use config::{CollectionConfig, Config};
pub use error::{CollectorError, ConfigError, ManagerError, MetricError, PlatformError};
pub use manager::Manager;
pub use metric::{Labels, MetricKind, MetricPoint, MetricValue, ValueKind};
pub use platform::{FakePlatform, LinuxPlatform, Platform};
pub use reporter::{LogReporter, Reporter};
