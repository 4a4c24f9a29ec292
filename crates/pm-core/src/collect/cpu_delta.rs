//! Per-process CPU usage from cumulative CPU time.
//!
//! Providers report CPU time consumed since each process started. Usage for
//! one refresh cycle is the growth of that counter divided by the wall time
//! between two snapshots, so a process that is idle now reads 0 no matter
//! how busy it used to be. A process seen for the first time reads 0.

use super::types::Snapshot;
use chrono::{DateTime, Local};
use pm_common::ProcessId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Pid plus start time, so a reused pid starts over.
type ProcessKey = (ProcessId, Option<DateTime<Local>>);

/// Remembers each process's CPU time from the previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProcessCpuTracker {
    last: HashMap<ProcessKey, Duration>,
    taken: Option<Instant>,
}

impl ProcessCpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill in `cpu_percent` for every record that carries a CPU time.
    pub fn apply(&mut self, snapshot: &mut Snapshot) {
        self.apply_at(snapshot, Instant::now());
    }

    /// [`ProcessCpuTracker::apply`] with the snapshot's monotonic timestamp.
    ///
    /// Records without a CPU time keep the provider's figure. Processes
    /// absent from `snapshot` are forgotten.
    pub fn apply_at(&mut self, snapshot: &mut Snapshot, now: Instant) {
        let wall = self
            .taken
            .map(|taken| now.saturating_duration_since(taken))
            .filter(|wall| !wall.is_zero());

        let mut seen = HashMap::with_capacity(snapshot.records.len());
        for record in &mut snapshot.records {
            let Some(cpu_time) = record.cpu_time else {
                continue;
            };
            let key = (record.pid, record.created_at);
            record.cpu_percent = match (self.last.get(&key), wall) {
                (Some(previous), Some(wall)) => {
                    let used = cpu_time.saturating_sub(*previous);
                    used.as_secs_f64() / wall.as_secs_f64() * 100.0
                }
                _ => 0.0,
            };
            seen.insert(key, cpu_time);
        }

        self.last = seen;
        self.taken = Some(now);
    }

    /// Processes with a remembered CPU time.
    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::{ProcessRecord, ProcessStatus};
    use chrono::TimeZone;

    fn record(pid: u32, cpu_time_ms: Option<u64>, started_hour: u32) -> ProcessRecord {
        ProcessRecord {
            pid: ProcessId(pid),
            name: format!("proc{pid}"),
            owner: "alice".to_string(),
            status: ProcessStatus::Sleeping,
            resident_memory_bytes: 0,
            cpu_percent: 7.5,
            cpu_time: cpu_time_ms.map(Duration::from_millis),
            created_at: Local.with_ymd_and_hms(2026, 1, 14, started_hour, 0, 0).single(),
        }
    }

    fn percents(snapshot: &Snapshot) -> Vec<f64> {
        snapshot.records.iter().map(|r| r.cpu_percent).collect()
    }

    #[test]
    fn test_first_sighting_reads_zero() {
        let mut tracker = ProcessCpuTracker::new();
        let mut snapshot = Snapshot::new(vec![record(10, Some(120_000), 9)]);
        tracker.apply_at(&mut snapshot, Instant::now());
        assert_eq!(percents(&snapshot), vec![0.0]);
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn test_usage_is_delta_over_wall_time() {
        let mut tracker = ProcessCpuTracker::new();
        let start = Instant::now();

        // pid 10 burned two minutes in the past and is idle now
        let mut first = Snapshot::new(vec![record(10, Some(120_000), 9), record(11, Some(500), 9)]);
        tracker.apply_at(&mut first, start);

        let mut second =
            Snapshot::new(vec![record(10, Some(120_000), 9), record(11, Some(1_500), 9)]);
        tracker.apply_at(&mut second, start + Duration::from_secs(2));

        let got = percents(&second);
        assert_eq!(got[0], 0.0);
        assert!((got[1] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_reused_pid_starts_over() {
        let mut tracker = ProcessCpuTracker::new();
        let start = Instant::now();
        let mut first = Snapshot::new(vec![record(10, Some(1_000), 9)]);
        tracker.apply_at(&mut first, start);

        let mut second = Snapshot::new(vec![record(10, Some(3_000), 11)]);
        tracker.apply_at(&mut second, start + Duration::from_secs(1));
        assert_eq!(percents(&second), vec![0.0]);
    }

    #[test]
    fn test_vanished_processes_are_forgotten() {
        let mut tracker = ProcessCpuTracker::new();
        let start = Instant::now();
        let mut first = Snapshot::new(vec![record(10, Some(1_000), 9), record(11, Some(1_000), 9)]);
        tracker.apply_at(&mut first, start);

        let mut second = Snapshot::new(vec![record(11, Some(1_000), 9)]);
        tracker.apply_at(&mut second, start + Duration::from_secs(1));
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn test_provider_figure_kept_without_cpu_time() {
        let mut tracker = ProcessCpuTracker::new();
        let mut snapshot = Snapshot::new(vec![record(12, None, 9)]);
        tracker.apply_at(&mut snapshot, Instant::now());
        assert_eq!(percents(&snapshot), vec![7.5]);
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_same_instant_reads_zero() {
        let mut tracker = ProcessCpuTracker::new();
        let now = Instant::now();
        let mut first = Snapshot::new(vec![record(10, Some(1_000), 9)]);
        tracker.apply_at(&mut first, now);
        let mut second = Snapshot::new(vec![record(10, Some(2_000), 9)]);
        tracker.apply_at(&mut second, now);
        assert_eq!(percents(&second), vec![0.0]);
    }
}
