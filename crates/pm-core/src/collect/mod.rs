//! Process collection.
//!
//! This module is the only place procman touches the OS process table:
//! - `ProcessSource` abstracts "read whatever the OS will give us"
//! - `list_processes` turns raw reads into a validated `Snapshot`
//! - `PsProcessSource` is the production source (single `ps` invocation)
//! - `ProcessCpuTracker` turns cumulative CPU time into per-cycle usage
//! - `system` reads the memory/CPU/disk figures for the header

mod cpu_delta;
mod quick_scan;
pub mod system;
mod types;

pub use cpu_delta::ProcessCpuTracker;
pub use quick_scan::{PsProcessSource, ScanError, ScanOptions};
pub use system::{CpuSampler, SystemSummary};
pub use types::{ProcessRecord, ProcessStatus, RawEntry, RawProcess, ReadError, Snapshot};

use pm_common::ProcessId;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, span, Level};

use crate::logging::event_names;

/// A best-effort reader of the OS process table.
pub trait ProcessSource {
    /// Enumerate every process currently visible.
    ///
    /// Per-process failures are returned as `Err` entries; an `Err` result
    /// means the enumeration facility itself is unavailable.
    fn enumerate(&self) -> Result<Vec<RawEntry>, ScanError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "process-source"
    }
}

/// Take a snapshot from `source`.
///
/// Entries that failed, or that lack any of pid, name, owner or status, are
/// dropped rather than defaulted. A pid seen twice keeps its first record.
pub fn list_processes(source: &dyn ProcessSource) -> Result<Snapshot, ScanError> {
    let _span = span!(Level::DEBUG, "list_processes", source = source.name()).entered();
    let start = Instant::now();

    let entries = source.enumerate()?;
    let total = entries.len();

    let mut seen = HashSet::with_capacity(total);
    let mut records = Vec::with_capacity(total);
    for entry in entries {
        let raw = match entry {
            Ok(raw) => raw,
            Err(err) => {
                log_unreadable(err);
                continue;
            }
        };
        let Some(record) = normalize(raw) else {
            continue;
        };
        if seen.insert(record.pid) {
            records.push(record);
        } else {
            debug!(pid = record.pid.0, "skipping duplicate pid");
        }
    }

    let mut snapshot = Snapshot::new(records);
    snapshot.skipped = total - snapshot.len();

    debug!(
        target: event_names::SCAN_FINISHED,
        process_count = snapshot.len(),
        skipped = snapshot.skipped,
        duration_ms = start.elapsed().as_millis() as u64,
        "snapshot taken"
    );
    Ok(snapshot)
}

fn log_unreadable(err: ReadError) {
    match err.pid {
        Some(pid) => {
            let err = pm_common::Error::TransientRead {
                pid,
                reason: err.reason,
            };
            debug!(code = err.code(), error = %err, "skipping unreadable process");
        }
        None => debug!(reason = %err.reason, "skipping unparseable process entry"),
    }
}

/// Validate one raw read. Returns `None` when a required field is missing.
pub fn normalize(raw: RawProcess) -> Option<ProcessRecord> {
    let RawProcess {
        pid,
        name,
        owner,
        status,
        rss_bytes,
        cpu_percent,
        cpu_time,
        created_at,
        ..
    } = raw;

    let (Some(pid), Some(name), Some(owner), Some(status)) = (pid, name, owner, status) else {
        debug!(?pid, "skipping partially read process");
        return None;
    };
    let pid = ProcessId::new(pid)?;

    Some(ProcessRecord {
        pid,
        name,
        owner,
        status,
        resident_memory_bytes: rss_bytes.unwrap_or(0),
        cpu_percent: cpu_percent
            .filter(|c| c.is_finite() && *c >= 0.0)
            .unwrap_or(0.0),
        cpu_time,
        created_at,
    })
}
