//! Scripted platform for deterministic tests of collectors and the manager.
//!
//! Every reading returns a fixed value. A reading can be told to fail the
//! next `n` times before succeeding again, which is how tests drive a
//! collector through a failing tick followed by a good one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{DiskUsage, Partition, Platform, VirtualMemory};
use crate::error::PlatformError;

/// Readings a [`FakePlatform`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    CpuPercent,
    CpuModel,
    CpuCounts,
    VirtualMemory,
    Partitions,
    DiskUsage,
    Temperatures,
}

#[derive(Debug, Clone)]
struct FakeState {
    cpu_percent: f64,
    cpu_model: String,
    physical_cores: usize,
    logical_cores: usize,
    memory: VirtualMemory,
    partitions: Vec<Partition>,
    usages: HashMap<String, DiskUsage>,
    temperatures: Vec<(String, f64)>,
    failures: HashMap<Reading, usize>,
}

/// In-memory [`Platform`] with scripted readings.
pub struct FakePlatform {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    /// A four-core host with 8 GiB of memory and no partitions.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                cpu_percent: 12.5,
                cpu_model: "Fake CPU @ 3.00GHz".to_string(),
                physical_cores: 2,
                logical_cores: 4,
                memory: VirtualMemory {
                    total: 8 * 1024 * 1024 * 1024,
                    free: 2 * 1024 * 1024 * 1024,
                    used: 5 * 1024 * 1024 * 1024,
                },
                partitions: Vec::new(),
                usages: HashMap::new(),
                temperatures: Vec::new(),
                failures: HashMap::new(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_cpu(self, percent: f64, model: &str, physical: usize, logical: usize) -> Self {
        {
            let mut state = self.lock();
            state.cpu_percent = percent;
            state.cpu_model = model.to_string();
            state.physical_cores = physical;
            state.logical_cores = logical;
        }
        self
    }

    pub fn with_memory(self, memory: VirtualMemory) -> Self {
        self.lock().memory = memory;
        self
    }

    /// Adds a mounted partition and the usage returned for its mount path.
    pub fn with_partition(self, partition: Partition, usage: DiskUsage) -> Self {
        {
            let mut state = self.lock();
            state.usages.insert(partition.mountpoint.clone(), usage);
            state.partitions.push(partition);
        }
        self
    }

    /// Adds a mounted partition whose usage lookup always fails.
    pub fn with_unreadable_partition(self, partition: Partition) -> Self {
        self.lock().partitions.push(partition);
        self
    }

    pub fn with_temperature(self, sensor: &str, celsius: f64) -> Self {
        self.lock().temperatures.push((sensor.to_string(), celsius));
        self
    }

    /// Makes the next `times` calls of `reading` fail.
    pub fn fail_next(&self, reading: Reading, times: usize) {
        self.lock().failures.insert(reading, times);
    }

    /// Total number of readings served, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, state: &mut FakeState, reading: Reading) -> Result<(), PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(remaining) = state.failures.get_mut(&reading) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PlatformError::Unsupported(format!(
                    "scripted failure of {:?}",
                    reading
                )));
            }
        }
        Ok(())
    }
}

impl Platform for FakePlatform {
    fn cpu_percent(&self) -> Result<f64, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::CpuPercent)?;
        Ok(state.cpu_percent)
    }

    fn cpu_model(&self) -> Result<String, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::CpuModel)?;
        Ok(state.cpu_model.clone())
    }

    fn cpu_counts(&self, logical: bool) -> Result<usize, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::CpuCounts)?;
        Ok(if logical {
            state.logical_cores
        } else {
            state.physical_cores
        })
    }

    fn virtual_memory(&self) -> Result<VirtualMemory, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::VirtualMemory)?;
        Ok(state.memory)
    }

    fn partitions(&self) -> Result<Vec<Partition>, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::Partitions)?;
        Ok(state.partitions.clone())
    }

    fn disk_usage(&self, mountpoint: &str) -> Result<DiskUsage, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::DiskUsage)?;
        state.usages.get(mountpoint).copied().ok_or_else(|| {
            PlatformError::Unsupported(format!("no usage scripted for {}", mountpoint))
        })
    }

    fn temperatures(&self) -> Result<Vec<(String, f64)>, PlatformError> {
        let mut state = self.lock();
        self.check(&mut state, Reading::Temperatures)?;
        let mut readings = state.temperatures.clone();
        readings.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_then_recover() {
        let platform = FakePlatform::new();
        platform.fail_next(Reading::VirtualMemory, 2);

        assert!(platform.virtual_memory().is_err());
        assert!(platform.virtual_memory().is_err());
        assert!(platform.virtual_memory().is_ok());
        assert_eq!(platform.calls(), 3);
    }

    #[test]
    fn test_unscripted_usage_fails() {
        let platform = FakePlatform::new().with_unreadable_partition(Partition::new(
            "/dev/sdz1",
            "/broken",
            "ext4",
        ));
        assert_eq!(platform.partitions().unwrap().len(), 1);
        assert!(platform.disk_usage("/broken").is_err());
    }
}
