//! Disk collector: usage of every mounted partition.
//!
//! Partitions whose mount path equals an entry of the ignore list are
//! skipped. Matching is exact string equality, so `/proc/` does not match
//! an ignore entry of `/proc`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{BaseCollector, Batch, BoxFuture, Collector, CollectorState, DISK};
use crate::config::DiskCollectorConfig;
use crate::error::CollectorError;
use crate::metric::{Labels, MetricKind, MetricPoint};
use crate::platform::{Partition, Platform};

pub struct DiskCollector {
    base: BaseCollector,
    platform: Arc<dyn Platform>,
    ignore_paths: Vec<String>,
}

impl DiskCollector {
    pub fn new(interval: Duration, ignore_paths: Vec<String>, platform: Arc<dyn Platform>) -> Self {
        Self {
            base: BaseCollector::new(DISK, interval),
            platform,
            ignore_paths,
        }
    }

    pub fn from_config(config: &DiskCollectorConfig, platform: Arc<dyn Platform>) -> Self {
        Self::new(config.interval, config.ignore_paths.clone(), platform)
    }

    fn should_ignore(&self, mountpoint: &str) -> bool {
        self.ignore_paths.iter().any(|p| p == mountpoint)
    }
}

fn partition_labels(partition: &Partition) -> Labels {
    Labels::from([
        ("device".to_string(), partition.device.clone()),
        ("mountpoint".to_string(), partition.mountpoint.clone()),
        ("fstype".to_string(), partition.fstype.clone()),
    ])
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        self.base.name()
    }

    /// One pass over all partitions. A single failed usage lookup aborts
    /// the whole pass.
    fn collect(&self) -> Result<Batch, CollectorError> {
        let mut points = Vec::new();

        for partition in self.platform.partitions()? {
            if self.should_ignore(&partition.mountpoint) {
                trace!("Ignoring partition {}", partition.mountpoint);
                continue;
            }

            let usage = self.platform.disk_usage(&partition.mountpoint)?;
            let labels = partition_labels(&partition);

            points.push(
                MetricPoint::float(MetricKind::DiskUsage, usage.used_percent)
                    .with_unit("percent")
                    .with_labels(labels.clone()),
            );
            points.push(
                MetricPoint::uint(MetricKind::DiskUsed, usage.used)
                    .with_unit("bytes")
                    .with_labels(labels.clone()),
            );
            points.push(
                MetricPoint::uint(MetricKind::DiskFree, usage.free)
                    .with_unit("bytes")
                    .with_labels(labels.clone()),
            );
            points.push(
                MetricPoint::uint(MetricKind::DiskTotal, usage.total)
                    .with_unit("bytes")
                    .with_labels(labels),
            );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::platform::DiskUsage;

    fn collector(platform: FakePlatform, ignore: &[&str]) -> DiskCollector {
        DiskCollector::new(
            Duration::from_secs(60),
            ignore.iter().map(|s| s.to_string()).collect(),
            Arc::new(platform),
        )
    }

    #[test]
    fn test_collect_emits_four_points_per_partition() {
        let platform = FakePlatform::new()
            .with_partition(
                Partition::new("/dev/sda1", "/", "ext4"),
                DiskUsage::from_parts(1000, 400, 600),
            )
            .with_partition(
                Partition::new("/dev/sdb1", "/data", "xfs"),
                DiskUsage::from_parts(2000, 1500, 500),
            );

        let points = collector(platform, &[]).collect().unwrap();
        assert_eq!(points.len(), 8);

        let root: Vec<_> = points
            .iter()
            .filter(|p| p.label("mountpoint") == Some("/"))
            .collect();
        assert_eq!(root.len(), 4);
        assert_eq!(root[0].kind(), MetricKind::DiskUsage);
        assert!((root[0].as_float().unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(root[1].as_int().unwrap(), 600);
        assert_eq!(root[2].as_int().unwrap(), 400);
        assert_eq!(root[3].as_int().unwrap(), 1000);
        for point in &root {
            assert_eq!(point.label("device"), Some("/dev/sda1"));
            assert_eq!(point.label("fstype"), Some("ext4"));
        }
    }

    #[test]
    fn test_ignore_paths_match_exactly() {
        let platform = FakePlatform::new()
            .with_partition(
                Partition::new("proc", "/proc", "proc"),
                DiskUsage::from_parts(0, 0, 0),
            )
            .with_partition(
                Partition::new("proc", "/proc/", "proc"),
                DiskUsage::from_parts(0, 0, 0),
            )
            .with_partition(
                Partition::new("sysfs", "/proc/sys", "sysfs"),
                DiskUsage::from_parts(0, 0, 0),
            );

        let points = collector(platform, &["/proc"]).collect().unwrap();

        assert!(points.iter().all(|p| p.label("mountpoint") != Some("/proc")));
        assert_eq!(
            points
                .iter()
                .filter(|p| p.label("mountpoint") == Some("/proc/"))
                .count(),
            4
        );
        assert_eq!(
            points
                .iter()
                .filter(|p| p.label("mountpoint") == Some("/proc/sys"))
                .count(),
            4
        );
    }

    #[test]
    fn test_only_ignored_partition_yields_nothing() {
        let platform = FakePlatform::new().with_partition(
            Partition::new("proc", "/proc", "proc"),
            DiskUsage::from_parts(0, 0, 0),
        );
        assert!(collector(platform, &["/proc"]).collect().unwrap().is_empty());
    }

    #[test]
    fn test_failed_usage_aborts_whole_pass() {
        let platform = FakePlatform::new()
            .with_partition(
                Partition::new("/dev/sda1", "/", "ext4"),
                DiskUsage::from_parts(1000, 400, 600),
            )
            .with_unreadable_partition(Partition::new("server:/export", "/mnt/nfs", "nfs"));

        assert!(collector(platform, &[]).collect().is_err());
    }

    #[test]
    fn test_ignored_unreadable_partition_is_not_queried() {
        let platform = FakePlatform::new()
            .with_partition(
                Partition::new("/dev/sda1", "/", "ext4"),
                DiskUsage::from_parts(1000, 400, 600),
            )
            .with_unreadable_partition(Partition::new("server:/export", "/mnt/nfs", "nfs"));

        let points = collector(platform, &["/mnt/nfs"]).collect().unwrap();
        assert_eq!(points.len(), 4);
    }
}
