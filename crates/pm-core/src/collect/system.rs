//! System-wide figures for the monitor header.
//!
//! Linux reads `/proc/meminfo` and `/proc/stat`; disk usage comes from
//! `statvfs` on any Unix. Values that cannot be read are `None` and render as
//! `n/a`.

use serde::Serialize;
use std::path::Path;

/// Memory, CPU and disk usage at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemSummary {
    pub memory_used_mb: Option<f64>,
    pub memory_total_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

impl SystemSummary {
    /// Read the current figures. CPU usage is measured against the previous
    /// call on the same sampler.
    pub fn collect(cpu: &mut CpuSampler) -> Self {
        let (memory_used_mb, memory_total_mb) = match read_meminfo() {
            Some((total_kb, available_kb)) => (
                Some(total_kb.saturating_sub(available_kb) as f64 / 1024.0),
                Some(total_kb as f64 / 1024.0),
            ),
            None => (None, None),
        };

        SystemSummary {
            memory_used_mb,
            memory_total_mb,
            cpu_percent: cpu.sample(),
            disk_percent: disk_usage_percent(Path::new("/")),
        }
    }
}

/// Aggregate CPU counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Busy-percentage sampler that remembers the previous reading.
///
/// The first sample is measured against boot.
#[derive(Debug, Clone, Default)]
pub struct CpuSampler {
    last: Option<CpuTimes>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self) -> Option<f64> {
        let now = read_cpu_times()?;
        Some(self.observe(now))
    }

    /// Record a reading and return the busy percentage since the last one.
    pub fn observe(&mut self, now: CpuTimes) -> f64 {
        let previous = self.last.replace(now).unwrap_or(CpuTimes { idle: 0, total: 0 });
        let total = now.total.saturating_sub(previous.total);
        let idle = now.idle.saturating_sub(previous.idle);
        if total == 0 {
            return 0.0;
        }
        let busy = total.saturating_sub(idle) as f64;
        (busy / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// Idle time includes iowait, matching how `top` reports it.
pub fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
    let rest = line.strip_prefix("cpu ")?;
    let values: Vec<u64> = rest
        .split_whitespace()
        .map(|v| v.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    if values.len() < 4 {
        return None;
    }
    // user nice system idle iowait irq softirq steal guest guest_nice
    // guest time is already counted in user/nice
    let counted = &values[..values.len().min(8)];
    let total = counted.iter().sum();
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes { idle, total })
}

/// Parse `MemTotal` and `MemAvailable` (kB) out of `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Option<(u64, u64)> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = rest.split_whitespace().next().and_then(|s| s.parse().ok());
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = rest.split_whitespace().next().and_then(|s| s.parse().ok());
        }
    }
    Some((total?, available?))
}

#[cfg(target_os = "linux")]
fn read_cpu_times() -> Option<CpuTimes> {
    let content = std::fs::read_to_string("/proc/stat").ok()?;
    content.lines().find_map(parse_cpu_line)
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_times() -> Option<CpuTimes> {
    None
}

#[cfg(target_os = "linux")]
fn read_meminfo() -> Option<(u64, u64)> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_meminfo() -> Option<(u64, u64)> {
    None
}

/// Percentage of the filesystem at `path` in use, as `df` computes it.
#[cfg(unix)]
pub fn disk_usage_percent(path: &Path) -> Option<f64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }

    let frsize = stat.f_frsize as f64;
    let total = stat.f_blocks as f64 * frsize;
    let free = stat.f_bfree as f64 * frsize;
    let avail = stat.f_bavail as f64 * frsize;
    let used = total - free;
    let usable = used + avail;
    if usable <= 0.0 {
        return None;
    }
    Some(used / usable * 100.0)
}

#[cfg(not(unix))]
pub fn disk_usage_percent(_path: &Path) -> Option<f64> {
    None
}
