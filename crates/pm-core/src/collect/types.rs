//! Common types for process scanning.
//!
//! `RawProcess` is what a provider managed to read for one OS process;
//! `ProcessRecord` is the validated form the rest of procman works with.

use chrono::{DateTime, Local};
use pm_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process status as shown to the operator.
///
/// Maps the Unix state letters onto five coarse buckets:
/// - R: running
/// - S, D, I: sleeping (interruptible, uninterruptible, idle)
/// - T, t: stopped (job control or trace)
/// - Z: zombie
/// - anything else: unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Unknown,
}

impl ProcessStatus {
    pub const ALL: [ProcessStatus; 5] = [
        ProcessStatus::Running,
        ProcessStatus::Sleeping,
        ProcessStatus::Stopped,
        ProcessStatus::Zombie,
        ProcessStatus::Unknown,
    ];

    /// Parse process status from the first character of a ps state column.
    pub fn from_state_char(c: char) -> Self {
        match c {
            'R' => ProcessStatus::Running,
            'S' | 'D' | 'I' => ProcessStatus::Sleeping,
            'T' | 't' => ProcessStatus::Stopped,
            'Z' => ProcessStatus::Zombie,
            _ => ProcessStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        ProcessStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| {
                format!(
                    "unknown status {s:?} (expected running, sleeping, stopped, zombie or unknown)"
                )
            })
    }
}

/// One process at snapshot time.
///
/// Records are built fresh every refresh cycle and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: ProcessId,

    /// Command name (basename only).
    pub name: String,

    /// Owning user; may be empty when the name could not be resolved.
    pub owner: String,

    pub status: ProcessStatus,

    /// Resident set size in bytes.
    pub resident_memory_bytes: u64,

    /// CPU usage since the previous snapshot, in percent of one core.
    pub cpu_percent: f64,

    /// Cumulative CPU time (user + system) since the process started.
    #[serde(skip)]
    pub cpu_time: Option<Duration>,

    /// Process start time; `None` when the provider could not read it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Local>>,
}

impl ProcessRecord {
    /// Resident memory in MiB.
    pub fn memory_mb(&self) -> f64 {
        self.resident_memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// What a provider read for one process. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProcess {
    pub pid: Option<u32>,
    pub ppid: Option<u32>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub status: Option<ProcessStatus>,
    pub rss_bytes: Option<u64>,
    /// Usage over a recent window, when the provider measures it itself.
    pub cpu_percent: Option<f64>,
    pub cpu_time: Option<Duration>,
    pub created_at: Option<DateTime<Local>>,
}

/// A process that vanished or could not be read during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub pid: Option<u32>,
    pub reason: String,
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "pid {pid}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// One enumeration entry: either a (possibly partial) read or a failure.
pub type RawEntry = Result<RawProcess, ReadError>;

/// The full set of validated records captured at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub records: Vec<ProcessRecord>,

    /// When the snapshot was taken.
    pub taken_at: DateTime<Local>,

    /// Entries dropped during normalization.
    pub skipped: usize,
}

impl Snapshot {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Snapshot {
            records,
            taken_at: Local::now(),
            skipped: 0,
        }
    }

    pub fn empty() -> Self {
        Snapshot::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: ProcessId) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }
}
