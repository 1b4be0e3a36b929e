//! OS metric sampling primitives.
//!
//! Collectors never touch `/proc` directly; they go through the [`Platform`]
//! trait so the same collector code runs against the live Linux readers in
//! [`linux`] or the scripted readings of [`fake`].

pub mod fake;
pub mod linux;

use crate::error::PlatformError;

pub use fake::FakePlatform;
pub use linux::LinuxPlatform;

/// Virtual memory totals in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualMemory {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

/// A mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
}

impl Partition {
    pub fn new(
        device: impl Into<String>,
        mountpoint: impl Into<String>,
        fstype: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
            fstype: fstype.into(),
        }
    }
}

/// Space usage of one mounted filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiskUsage {
    pub total: u64,
    /// Space available to unprivileged users.
    pub free: u64,
    pub used: u64,
    pub used_percent: f64,
}

impl DiskUsage {
    /// Builds a usage record, deriving `used_percent` as `used / (used + free)`.
    pub fn from_parts(total: u64, free: u64, used: u64) -> Self {
        let denominator = used.saturating_add(free);
        let used_percent = if denominator == 0 {
            0.0
        } else {
            used as f64 / denominator as f64 * 100.0
        };
        Self {
            total,
            free,
            used,
            used_percent,
        }
    }
}

/// Source of raw host readings.
pub trait Platform: Send + Sync {
    /// Aggregate CPU utilization in percent (0-100), without blocking.
    fn cpu_percent(&self) -> Result<f64, PlatformError>;

    /// CPU model name.
    fn cpu_model(&self) -> Result<String, PlatformError>;

    /// Number of logical CPUs when `logical` is true, physical cores otherwise.
    fn cpu_counts(&self, logical: bool) -> Result<usize, PlatformError>;

    fn virtual_memory(&self) -> Result<VirtualMemory, PlatformError>;

    /// All mounted partitions, unfiltered.
    fn partitions(&self) -> Result<Vec<Partition>, PlatformError>;

    fn disk_usage(&self, mountpoint: &str) -> Result<DiskUsage, PlatformError>;

    /// Temperature sensors as `(sensor, celsius)`, sorted by sensor name.
    fn temperatures(&self) -> Result<Vec<(String, f64)>, PlatformError>;
}
