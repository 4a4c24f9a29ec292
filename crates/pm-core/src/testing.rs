//! Scripted stand-ins for the OS, the chooser and the operator terminal.
//!
//! Used by unit tests and, with the `test-utils` feature, by the
//! integration tests that drive the refresh loop end to end.

use crate::action::{TerminateError, Terminator};
use crate::collect::{ProcessSource, ProcessStatus, RawEntry, RawProcess, ScanError};
use crate::controller::Sleeper;
use crate::render::Palette;
use crate::select::{Chooser, ChooserError, NoticeLevel, Operator};
use chrono::{Local, TimeZone};
use pm_common::ProcessId;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

/// A complete raw read.
pub fn raw_process(
    pid: u32,
    name: &str,
    owner: &str,
    status: ProcessStatus,
    memory_mb: f64,
    cpu: f64,
) -> RawProcess {
    RawProcess {
        pid: Some(pid),
        ppid: Some(1),
        name: Some(name.to_string()),
        owner: Some(owner.to_string()),
        status: Some(status),
        rss_bytes: Some((memory_mb * MB as f64) as u64),
        cpu_percent: Some(cpu),
        cpu_time: None,
        created_at: Local.with_ymd_and_hms(2026, 1, 14, 10, 30, 0).single(),
    }
}

/// init, and two chrome processes owned by alice.
pub fn sample_entries() -> Vec<RawEntry> {
    vec![
        Ok(raw_process(1, "init", "root", ProcessStatus::Running, 2.0, 0.1)),
        Ok(raw_process(50, "chrome", "alice", ProcessStatus::Running, 300.0, 12.5)),
        Ok(raw_process(51, "chrome", "alice", ProcessStatus::Sleeping, 50.0, 0.0)),
    ]
}

/// Returns scripted enumerations in order, repeating the last one.
pub struct ScriptedSource {
    script: RefCell<VecDeque<Result<Vec<RawEntry>, String>>>,
    last: RefCell<Option<Result<Vec<RawEntry>, String>>>,
}

impl ScriptedSource {
    pub fn sequence(script: Vec<Result<Vec<RawEntry>, String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            last: RefCell::new(None),
        }
    }

    pub fn always(entries: Vec<RawEntry>) -> Self {
        Self::sequence(vec![Ok(entries)])
    }

    pub fn failing(reason: &str) -> Self {
        Self::sequence(vec![Err(reason.to_string())])
    }
}

impl ProcessSource for ScriptedSource {
    fn enumerate(&self) -> Result<Vec<RawEntry>, ScanError> {
        let next = self.script.borrow_mut().pop_front();
        let step = match next {
            Some(step) => {
                *self.last.borrow_mut() = Some(step.clone());
                step
            }
            None => self
                .last
                .borrow()
                .clone()
                .unwrap_or_else(|| Ok(Vec::new())),
        };
        step.map_err(ScanError::CommandFailed)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Answers every `choose` call from a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    /// Line index to pick per call; `None` declines. The last entry repeats.
    picks: VecDeque<Option<usize>>,
    last: Option<usize>,
    /// Calls left that fail with `failure_code` before `picks` apply.
    failures: usize,
    failure_code: Option<i32>,
    /// Raised on every call, like Ctrl-C pressed inside fzf.
    raise: Option<Arc<AtomicBool>>,
    pub calls: usize,
    pub seen: Vec<Vec<String>>,
}

impl ScriptedChooser {
    pub fn sequence(picks: impl IntoIterator<Item = Option<usize>>) -> Self {
        Self {
            picks: picks.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn picks_line(index: usize) -> Self {
        Self::sequence([Some(index)])
    }

    pub fn declines() -> Self {
        Self::sequence([None])
    }

    /// Fail the next `times` calls as if the chooser exited with `code`.
    pub fn failing_first(mut self, times: usize, code: Option<i32>) -> Self {
        self.failures = times;
        self.failure_code = code;
        self
    }

    /// Set `flag` whenever the chooser runs.
    pub fn raising(mut self, flag: Arc<AtomicBool>) -> Self {
        self.raise = Some(flag);
        self
    }
}

impl Chooser for ScriptedChooser {
    fn choose(&mut self, lines: &[String]) -> Result<Option<String>, ChooserError> {
        self.calls += 1;
        self.seen.push(lines.to_vec());
        if let Some(flag) = &self.raise {
            flag.store(true, Ordering::SeqCst);
        }
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ChooserError::Failed {
                code: self.failure_code,
            });
        }
        if let Some(pick) = self.picks.pop_front() {
            self.last = pick;
        }
        Ok(self.last.and_then(|i| lines.get(i).cloned()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Replays typed answers and records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<(NoticeLevel, String)>,
    pub screens: Vec<String>,
    pub shown: Vec<String>,
}

impl ScriptedOperator {
    /// Once the answers run out every prompt sees end of input.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl Operator for ScriptedOperator {
    fn prompt(&mut self, message: &str) -> std::io::Result<Option<String>> {
        self.prompts.push(message.to_string());
        Ok(self.inputs.pop_front())
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }

    fn display(&mut self, screen: &str) {
        self.screens.push(screen.to_string());
    }

    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }

    fn palette(&self) -> Palette {
        Palette::plain()
    }
}

/// Records termination requests. Unlisted pids report `NoSuchProcess`.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    outcomes: HashMap<u32, Result<(), TerminateError>>,
    calls: RefCell<Vec<ProcessId>>,
}

impl RecordingTerminator {
    pub fn with_outcomes(
        outcomes: impl IntoIterator<Item = (u32, Result<(), TerminateError>)>,
    ) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProcessId> {
        self.calls.borrow().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminateError> {
        self.calls.borrow_mut().push(pid);
        self.outcomes
            .get(&pid.0)
            .cloned()
            .unwrap_or(Err(TerminateError::NoSuchProcess))
    }
}

/// Returns immediately and records requested durations.
#[derive(Debug, Default)]
pub struct NoopSleeper {
    pub sleeps: Vec<Duration>,
    /// Raise the interrupt on this call (1-based).
    interrupt_on: Option<usize>,
}

impl NoopSleeper {
    pub fn interrupting_after(calls: usize) -> Self {
        Self {
            sleeps: Vec::new(),
            interrupt_on: Some(calls),
        }
    }
}

impl Sleeper for NoopSleeper {
    fn sleep(&mut self, duration: Duration, interrupt: &AtomicBool) -> bool {
        self.sleeps.push(duration);
        if self.interrupt_on == Some(self.sleeps.len()) {
            interrupt.store(true, Ordering::SeqCst);
        }
        interrupt.load(Ordering::SeqCst)
    }
}
