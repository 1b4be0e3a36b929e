//! CPU collector: utilization, model name and core counts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BaseCollector, Batch, BoxFuture, Collector, CollectorState, CPU};
use crate::config::CpuCollectorConfig;
use crate::error::CollectorError;
use crate::metric::{MetricKind, MetricPoint};
use crate::platform::Platform;

pub struct CpuCollector {
    base: BaseCollector,
    platform: Arc<dyn Platform>,
    include_temps: bool,
}

impl CpuCollector {
    pub fn new(interval: Duration, platform: Arc<dyn Platform>) -> Self {
        Self {
            base: BaseCollector::new(CPU, interval),
            platform,
            include_temps: false,
        }
    }

    pub fn from_config(config: &CpuCollectorConfig, platform: Arc<dyn Platform>) -> Self {
        Self::new(config.interval, platform).with_temperatures(config.include_temps)
    }

    /// Also emit one `cpu.temperature` point per thermal sensor.
    pub fn with_temperatures(mut self, include_temps: bool) -> Self {
        self.include_temps = include_temps;
        self
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn collect(&self) -> Result<Batch, CollectorError> {
        let mut points = Vec::with_capacity(4);

        let usage = self.platform.cpu_percent()?;
        points.push(
            MetricPoint::float(MetricKind::CpuUsage, usage)
                .with_unit("percent")
                .with_label("type", "total"),
        );

        let model = self.platform.cpu_model()?;
        points.push(MetricPoint::string(MetricKind::CpuModel, model));

        let physical = self.platform.cpu_counts(false)?;
        points.push(
            MetricPoint::uint(MetricKind::CpuCountPhysical, physical as u64)
                .with_unit("cores")
                .with_label("type", "physical"),
        );

        let logical = self.platform.cpu_counts(true)?;
        points.push(
            MetricPoint::uint(MetricKind::CpuCountLogical, logical as u64)
                .with_unit("cores")
                .with_label("type", "logical"),
        );

        if self.include_temps {
            for (sensor, celsius) in self.platform.temperatures()? {
                points.push(
                    MetricPoint::float(MetricKind::CpuTemperature, celsius)
                        .with_unit("celsius")
                        .with_label("sensor", sensor),
                );
            }
        }

        Ok(points)
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
