//! Linux readings from the /proc and /sys filesystems.
//!
//! CPU utilization comes from `/proc/stat` deltas, CPU identity from
//! `/proc/cpuinfo`, memory from `/proc/meminfo`, partitions from
//! `/proc/mounts` and space usage from `statvfs(3)`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use super::{DiskUsage, Partition, Platform, VirtualMemory};
use crate::error::PlatformError;

const PROC_STAT: &str = "/proc/stat";
const PROC_CPUINFO: &str = "/proc/cpuinfo";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_MOUNTS: &str = "/proc/mounts";

/// Aggregate CPU time counters from the `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Idle plus iowait.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy share of the time elapsed between `previous` and `self`, in percent.
    pub fn percent_since(&self, previous: &CpuStat) -> f64 {
        let delta_total = self.total().saturating_sub(previous.total());
        if delta_total == 0 {
            return 0.0;
        }
        let delta_idle = self.idle_total().saturating_sub(previous.idle_total());
        let busy = delta_total.saturating_sub(delta_idle);
        (busy as f64 / delta_total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Identity fields parsed from /proc/cpuinfo.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuInfo {
    pub model: Option<String>,
    pub logical: usize,
    pub physical: usize,
}

/// Live Linux platform.
pub struct LinuxPlatform {
    previous_cpu: Mutex<Option<CpuStat>>,
}

impl LinuxPlatform {
    pub fn new() -> Self {
        Self {
            previous_cpu: Mutex::new(None),
        }
    }

    fn read_cpuinfo(&self) -> Result<CpuInfo, PlatformError> {
        let content = read_file(PROC_CPUINFO)?;
        Ok(parse_cpuinfo(&content))
    }
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for LinuxPlatform {
    fn cpu_percent(&self) -> Result<f64, PlatformError> {
        let current = parse_cpu_stat(&read_file(PROC_STAT)?)?;

        let mut previous = self
            .previous_cpu
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // First reading compares against the counters at boot.
        let baseline = previous.unwrap_or_default();
        *previous = Some(current);

        Ok(current.percent_since(&baseline))
    }

    fn cpu_model(&self) -> Result<String, PlatformError> {
        self.read_cpuinfo()?
            .model
            .ok_or_else(|| PlatformError::parse(PROC_CPUINFO, "no CPU model name found"))
    }

    fn cpu_counts(&self, logical: bool) -> Result<usize, PlatformError> {
        let info = self.read_cpuinfo()?;
        let count = if logical { info.logical } else { info.physical };
        if count == 0 {
            return Err(PlatformError::parse(PROC_CPUINFO, "no processors listed"));
        }
        Ok(count)
    }

    fn virtual_memory(&self) -> Result<VirtualMemory, PlatformError> {
        parse_meminfo(&read_file(PROC_MEMINFO)?)
    }

    fn partitions(&self) -> Result<Vec<Partition>, PlatformError> {
        Ok(parse_mounts(&read_file(PROC_MOUNTS)?))
    }

    fn disk_usage(&self, mountpoint: &str) -> Result<DiskUsage, PlatformError> {
        statvfs_usage(mountpoint)
    }

    fn temperatures(&self) -> Result<Vec<(String, f64)>, PlatformError> {
        let mut readings = read_thermal_zones(Path::new("/sys/class/thermal"))?;
        readings.extend(read_hwmon_temps(Path::new("/sys/class/hwmon"))?);
        readings.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(readings)
    }
}

fn read_file(path: &str) -> Result<String, PlatformError> {
    fs::read_to_string(path).map_err(|e| PlatformError::io(path, e))
}

/// Parses the aggregate `cpu` line of /proc/stat.
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat, PlatformError> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| PlatformError::parse(PROC_STAT, "aggregate cpu line not found"))?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PlatformError::parse(PROC_STAT, e))?;

    if fields.len() < 7 {
        return Err(PlatformError::parse(
            PROC_STAT,
            format!("expected at least 7 cpu fields, got {}", fields.len()),
        ));
    }

    Ok(CpuStat {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
        steal: fields.get(7).copied().unwrap_or(0),
    })
}

/// Parses /proc/cpuinfo into model name and core counts.
///
/// Physical cores are the distinct `(physical id, core id)` pairs. Kernels
/// that omit those keys fall back to `cpu cores`, then to the logical count.
pub fn parse_cpuinfo(content: &str) -> CpuInfo {
    let mut model: Option<String> = None;
    let mut logical = 0;
    let mut cores_per_socket: Option<usize> = None;
    let mut physical_id: Option<String> = None;
    let mut cores: HashSet<(String, String)> = HashSet::new();
    let mut sockets: HashSet<String> = HashSet::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "processor" => logical += 1,
            "model name" | "Processor" | "cpu model" | "uarch" => {
                if model.is_none() && !value.is_empty() {
                    model = Some(value.to_string());
                }
            }
            "physical id" => {
                physical_id = Some(value.to_string());
                sockets.insert(value.to_string());
            }
            "core id" => {
                if let Some(pid) = &physical_id {
                    cores.insert((pid.clone(), value.to_string()));
                }
            }
            "cpu cores" => {
                if cores_per_socket.is_none() {
                    cores_per_socket = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    let physical = if !cores.is_empty() {
        cores.len()
    } else if let Some(per_socket) = cores_per_socket {
        per_socket * sockets.len().max(1)
    } else {
        logical
    };

    CpuInfo {
        model,
        logical,
        physical,
    }
}

/// Parses /proc/meminfo.
///
/// `used` is total minus free, buffers and page cache, as reported by `free(1)`.
pub fn parse_meminfo(content: &str) -> Result<VirtualMemory, PlatformError> {
    let mut total: Option<u64> = None;
    let mut free: Option<u64> = None;
    let mut buffers: Option<u64> = None;
    let mut cached: Option<u64> = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let slot = match key {
            "MemTotal:" => &mut total,
            "MemFree:" => &mut free,
            "Buffers:" => &mut buffers,
            "Cached:" => &mut cached,
            _ => continue,
        };
        let kb = value
            .parse::<u64>()
            .map_err(|e| PlatformError::parse(PROC_MEMINFO, format!("{} {}", key, e)))?;
        *slot = Some(kb * 1024);
    }

    match (total, free) {
        (Some(total), Some(free)) => {
            let used = total
                .saturating_sub(free)
                .saturating_sub(buffers.unwrap_or(0))
                .saturating_sub(cached.unwrap_or(0));
            Ok(VirtualMemory { total, free, used })
        }
        _ => Err(PlatformError::parse(
            PROC_MEMINFO,
            "MemTotal or MemFree missing",
        )),
    }
}

/// Parses /proc/mounts. Lines with fewer than three fields are skipped.
pub fn parse_mounts(content: &str) -> Vec<Partition> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mountpoint = parts.next()?;
            let fstype = parts.next()?;
            Some(Partition::new(
                unescape_mount_field(device),
                unescape_mount_field(mountpoint),
                fstype,
            ))
        })
        .collect()
}

/// Decodes the octal escapes (`\040` for space etc.) used in /proc/mounts.
pub fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn statvfs_usage(path: &str) -> Result<DiskUsage, PlatformError> {
    use std::ffi::CString;
    use std::mem;

    let c_path = CString::new(path).map_err(|e| PlatformError::Statvfs {
        path: path.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;

    // SAFETY: statvfs is plain old data, zeroed memory is a valid value, and
    // c_path is a valid NUL-terminated string for the duration of the call.
    let stat = unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(PlatformError::Statvfs {
                path: path.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }
        stat
    };

    let block_size = stat.f_frsize as u64;
    let total = block_size * stat.f_blocks as u64;
    let free = block_size * stat.f_bavail as u64;
    let used = total.saturating_sub(block_size * stat.f_bfree as u64);

    Ok(DiskUsage::from_parts(total, free, used))
}

/// Reads `thermal_zone*/temp` (millidegrees Celsius) below `base`.
fn read_thermal_zones(base: &Path) -> Result<Vec<(String, f64)>, PlatformError> {
    let mut readings = Vec::new();
    if !base.exists() {
        return Ok(readings);
    }

    let entries = fs::read_dir(base).map_err(|e| PlatformError::io(base, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let zone = entry.file_name().to_string_lossy().to_string();
        if !zone.starts_with("thermal_zone") {
            continue;
        }
        if let Some(celsius) = read_millidegrees(&path.join("temp")) {
            readings.push((zone, celsius));
        }
    }

    Ok(readings)
}

/// Reads `hwmon*/temp*_input` below `base`, naming sensors `<device>_<file>`.
fn read_hwmon_temps(base: &Path) -> Result<Vec<(String, f64)>, PlatformError> {
    let mut readings = Vec::new();
    if !base.exists() {
        return Ok(readings);
    }

    let entries = fs::read_dir(base).map_err(|e| PlatformError::io(base, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let hwmon = entry.file_name().to_string_lossy().to_string();
        if !hwmon.starts_with("hwmon") {
            continue;
        }

        let device = fs::read_to_string(path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| hwmon.clone());

        let Ok(files) = fs::read_dir(&path) else {
            debug!("Skipping unreadable hwmon directory {}", path.display());
            continue;
        };
        for file in files.flatten() {
            let name = file.file_name().to_string_lossy().to_string();
            if !name.starts_with("temp") || !name.ends_with("_input") {
                continue;
            }
            if let Some(celsius) = read_millidegrees(&file.path()) {
                readings.push((format!("{}_{}", device, name), celsius));
            }
        }
    }

    Ok(readings)
}

fn read_millidegrees(path: &Path) -> Option<f64> {
    let content = fs::read_to_string(path).ok()?;
    let millidegrees = content.trim().parse::<i64>().ok()?;
    Some(millidegrees as f64 / 1000.0)
}
