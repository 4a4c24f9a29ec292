//! Per-run state shared across refresh cycles.

use crate::collect::{CpuSampler, ProcessCpuTracker};
use crate::view::{FilterSpec, SortKey};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Number of action outcomes kept in the history.
pub const HISTORY_LIMIT: usize = 20;

/// One reported action outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub at: DateTime<Local>,
    pub message: String,
    pub ok: bool,
}

/// Filter, sort, refresh interval and action history for one program run.
///
/// Owned by the controller and handed by reference to whatever needs it;
/// only the controller thread mutates it.
#[derive(Debug, Clone)]
pub struct Session {
    pub filter: Option<FilterSpec>,
    pub sort: SortKey,
    pub interval: Duration,
    history: VecDeque<HistoryEntry>,
    cpu: CpuSampler,
    process_cpu: ProcessCpuTracker,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None, SortKey::default(), Duration::from_secs(2))
    }
}

impl Session {
    pub fn new(filter: Option<FilterSpec>, sort: SortKey, interval: Duration) -> Self {
        Self {
            filter,
            sort,
            interval,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            cpu: CpuSampler::new(),
            process_cpu: ProcessCpuTracker::new(),
        }
    }

    pub fn set_filter(&mut self, filter: Option<FilterSpec>) {
        self.filter = filter;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    /// Append an outcome, dropping the oldest past the limit.
    pub fn record(&mut self, message: impl Into<String>, ok: bool) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            at: Local::now(),
            message: message.into(),
            ok,
        });
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn last_action(&self) -> Option<&HistoryEntry> {
        self.history.back()
    }

    pub fn cpu_sampler(&mut self) -> &mut CpuSampler {
        &mut self.cpu
    }

    /// CPU times from the previous snapshot, for per-process usage.
    pub fn process_cpu(&mut self) -> &mut ProcessCpuTracker {
        &mut self.process_cpu
    }
}
