//! Memory collector: virtual memory used, total and free bytes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BaseCollector, Batch, BoxFuture, Collector, CollectorState, MEMORY};
use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::metric::{MetricKind, MetricPoint};
use crate::platform::Platform;

pub struct MemoryCollector {
    base: BaseCollector,
    platform: Arc<dyn Platform>,
}

impl MemoryCollector {
    pub fn new(interval: Duration, platform: Arc<dyn Platform>) -> Self {
        Self {
            base: BaseCollector::new(MEMORY, interval),
            platform,
        }
    }

    pub fn from_config(config: &CollectorConfig, platform: Arc<dyn Platform>) -> Self {
        Self::new(config.interval, platform)
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn collect(&self) -> Result<Batch, CollectorError> {
        let vm = self.platform.virtual_memory()?;

        let point = |kind, bytes| {
            MetricPoint::uint(kind, bytes)
                .with_unit("bytes")
                .with_label("type", "virtual")
        };

        Ok(vec![
            point(MetricKind::MemoryUsage, vm.used),
            point(MetricKind::MemoryTotal, vm.total),
            point(MetricKind::MemoryFree, vm.free),
        ])
    }

    fn start(
        &self,
        ctx: CancellationToken,
        output: mpsc::Sender<Batch>,
    ) -> BoxFuture<'_, Result<(), CollectorError>> {
        Box::pin(self.base.run(ctx, output, move || self.collect()))
    }

    fn stop(&self) -> Result<(), CollectorError> {
        self.base.stop()
    }

    fn interval(&self) -> Duration {
        self.base.interval()
    }

    fn state(&self) -> CollectorState {
        self.base.state()
    }
}
