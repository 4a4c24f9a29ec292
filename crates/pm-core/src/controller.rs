//! The refresh loop.
//!
//! States run strictly in sequence:
//!
//! ```text
//! Displaying -> AwaitingInteraction -> Acting -> Sleeping -> Displaying ...
//!                                        |
//!                                        +-- quit --> Terminated
//! ```
//!
//! The interrupt flag is checked at every state boundary and during sleeps;
//! once set, the next step moves to `Terminated`.

use crate::action::{terminate_many, terminate_one, TerminationOutcome, Terminator};
use crate::collect::{list_processes, ProcessSource, Snapshot, SystemSummary};
use crate::export::Exporter;
use crate::logging::{event_names, Stage};
use crate::render::{render_header, render_lines, HeaderInfo};
use crate::select::{
    select_and_act, ActionRequest, Chooser, ChooserError, NoticeLevel, Operator, SelectError,
};
use crate::session::Session;
use crate::view::project;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Displaying,
    AwaitingInteraction,
    Acting(ActionRequest),
    Sleeping,
    Terminated,
}

impl ControllerState {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Displaying => "displaying",
            ControllerState::AwaitingInteraction => "awaiting_interaction",
            ControllerState::Acting(_) => "acting",
            ControllerState::Sleeping => "sleeping",
            ControllerState::Terminated => "terminated",
        }
    }
}

/// Interruptible sleep.
pub trait Sleeper {
    /// Sleep for `duration`. Returns true if `interrupt` was raised first.
    fn sleep(&mut self, duration: Duration, interrupt: &AtomicBool) -> bool;
}

/// Sleeps on the current thread, checking the flag every `slice`.
///
/// A duration too long to represent as a deadline sleeps until interrupted.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSleeper {
    pub slice: Duration,
}

impl Default for ThreadSleeper {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(100),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration, interrupt: &AtomicBool) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if interrupt.load(Ordering::SeqCst) {
                return true;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.slice.min(deadline - now)
                }
                None => self.slice,
            };
            thread::sleep(wait);
        }
    }
}

/// The collaborators the loop drives.
pub struct Capabilities<'a> {
    pub source: &'a dyn ProcessSource,
    pub chooser: &'a mut dyn Chooser,
    pub operator: &'a mut dyn Operator,
    pub terminator: &'a dyn Terminator,
    pub sleeper: &'a mut dyn Sleeper,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Pause after an action's feedback, before the refresh sleep.
    pub feedback_pause: Duration,
    /// Stop after this many completed cycles.
    pub max_cycles: Option<u64>,
    /// Read memory/CPU/disk figures for the header.
    pub system_summary: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            feedback_pause: Duration::from_secs(1),
            max_cycles: None,
            system_summary: true,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub interrupted: bool,
}

pub struct Controller<'a> {
    caps: Capabilities<'a>,
    session: Session,
    settings: ControllerSettings,
    exporter: Exporter,
    interrupt: Arc<AtomicBool>,
    state: ControllerState,
    snapshot: Snapshot,
    lines: Vec<String>,
    scans: u64,
    cycles: u64,
    interrupted: bool,
}

impl<'a> Controller<'a> {
    pub fn new(
        caps: Capabilities<'a>,
        session: Session,
        settings: ControllerSettings,
        exporter: Exporter,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            caps,
            session,
            settings,
            exporter,
            interrupt,
            state: ControllerState::Displaying,
            snapshot: Snapshot::empty(),
            lines: Vec::new(),
            scans: 0,
            cycles: 0,
            interrupted: false,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn interrupt_requested(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    fn terminate_on_interrupt(&mut self) {
        info!(target: event_names::RUN_INTERRUPTED, state = self.state.name(), "interrupted");
        self.interrupted = true;
        self.state = ControllerState::Terminated;
    }

    /// Run states until `Terminated`.
    pub fn run(&mut self) -> pm_common::Result<RunSummary> {
        info!(
            target: event_names::RUN_STARTED,
            interval_secs = self.session.interval.as_secs(),
            "refresh loop started"
        );
        while self.state != ControllerState::Terminated {
            self.step()?;
        }
        info!(
            target: event_names::RUN_FINISHED,
            cycles = self.cycles,
            interrupted = self.interrupted,
            actions = self.session.history().count(),
            failed_actions = self.session.history().filter(|e| !e.ok).count(),
            "refresh loop finished"
        );
        Ok(RunSummary {
            cycles: self.cycles,
            interrupted: self.interrupted,
        })
    }

    /// Execute the current state and move to the next.
    ///
    /// The only error is a failure to enumerate processes on the very first
    /// scan, a chooser that cannot be started, or a terminal that cannot be
    /// read. A chooser that starts but fails is reported and the cycle
    /// continues as a refresh.
    pub fn step(&mut self) -> pm_common::Result<&ControllerState> {
        if self.state != ControllerState::Terminated && self.interrupt_requested() {
            self.terminate_on_interrupt();
            return Ok(&self.state);
        }

        let state = std::mem::replace(&mut self.state, ControllerState::Terminated);
        debug!(target: event_names::LOOP_STATE, state = state.name(), cycle = self.cycles, "step");

        self.state = match state {
            ControllerState::Displaying => {
                self.display()?;
                ControllerState::AwaitingInteraction
            }
            ControllerState::AwaitingInteraction => {
                let round = select_and_act(
                    &self.lines,
                    self.caps.chooser,
                    self.caps.operator,
                    &self.interrupt,
                );
                match round {
                    Ok(request) => ControllerState::Acting(request),
                    Err(SelectError::Chooser(
                        err @ (ChooserError::Failed { .. } | ChooserError::Io(_)),
                    )) => {
                        warn!(
                            target: event_names::UI_CHOOSER_FAILED,
                            stage = %Stage::Interact,
                            error = %err,
                            "chooser failed"
                        );
                        self.caps
                            .operator
                            .notify(NoticeLevel::Error, &format!("Chooser failed: {err}"));
                        ControllerState::Acting(ActionRequest::Refresh)
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            ControllerState::Acting(request) => self.act(request),
            ControllerState::Sleeping => self.sleep(),
            ControllerState::Terminated => ControllerState::Terminated,
        };
        Ok(&self.state)
    }

    fn display(&mut self) -> pm_common::Result<()> {
        self.snapshot = match list_processes(self.caps.source) {
            Ok(mut snapshot) => {
                self.session.process_cpu().apply(&mut snapshot);
                snapshot
            }
            Err(err) if self.scans == 0 => {
                warn!(
                    target: event_names::SCAN_FAILED,
                    stage = %Stage::Init,
                    error = %err,
                    "enumeration unavailable at startup"
                );
                return Err(err.into());
            }
            Err(err) => {
                warn!(
                    target: event_names::SCAN_FAILED,
                    stage = %Stage::Scan,
                    error = %err,
                    "enumeration failed"
                );
                self.caps
                    .operator
                    .notify(NoticeLevel::Error, &format!("Process enumeration failed: {err}"));
                Snapshot::empty()
            }
        };
        self.scans += 1;

        let summary = if self.settings.system_summary {
            SystemSummary::collect(self.session.cpu_sampler())
        } else {
            SystemSummary::default()
        };

        let view = project(&self.snapshot, self.session.filter.as_ref(), self.session.sort);
        self.lines = render_lines(&view);

        let last_action = self.session.last_action().map(|e| e.message.as_str());
        let header = render_header(
            &HeaderInfo {
                summary,
                interval_secs: self.session.interval.as_secs(),
                sort: self.session.sort,
                filter: self.session.filter.as_ref(),
                shown: view.len(),
                total: self.snapshot.len(),
                last_action,
            },
            &self.caps.operator.palette(),
        );

        let mut screen = header;
        for line in &self.lines {
            screen.push('\n');
            screen.push_str(line);
        }
        self.caps.operator.display(&screen);
        Ok(())
    }

    fn act(&mut self, request: ActionRequest) -> ControllerState {
        debug!(stage = %Stage::Act, kind = request.kind(), "acting");
        let feedback = match request {
            ActionRequest::Quit => {
                self.caps.operator.notify(NoticeLevel::Error, "Exiting...");
                return ControllerState::Terminated;
            }
            ActionRequest::Refresh => false,
            ActionRequest::TerminateOne(pid) => {
                let outcome = terminate_one(self.caps.terminator, pid);
                self.report(&outcome.message(pid), notice_level(&outcome), outcome.is_ok());
                true
            }
            ActionRequest::TerminateMany { pids, malformed } => {
                let mut batch = terminate_many(self.caps.terminator, &pids);
                batch.malformed = malformed;
                for (pid, outcome) in &batch.results {
                    self.caps
                        .operator
                        .notify(notice_level(outcome), &outcome.message(*pid));
                }
                for token in &batch.malformed {
                    self.caps
                        .operator
                        .notify(NoticeLevel::Warning, &format!("Ignoring invalid PID {token:?}."));
                }
                if pids.is_empty() && batch.malformed.is_empty() {
                    self.caps.operator.notify(NoticeLevel::Info, "No PIDs given.");
                }
                self.session.record(
                    format!(
                        "Batch terminate: {} requested, {} failed",
                        batch.results.len(),
                        batch.failed()
                    ),
                    batch.all_ok(),
                );
                true
            }
            ActionRequest::Export(format) => {
                let written = {
                    let view =
                        project(&self.snapshot, self.session.filter.as_ref(), self.session.sort);
                    self.exporter.export(format, &view)
                };
                match written {
                    Ok(path) => {
                        self.report(&format.success_message(&path), NoticeLevel::Success, true)
                    }
                    Err(err) => {
                        let common: pm_common::Error = err.into();
                        let color = self.caps.operator.palette().is_color();
                        let message = pm_common::format_error_human(&common, color);
                        self.report(&message, NoticeLevel::Error, false);
                    }
                }
                true
            }
            ActionRequest::SetFilter(filter) => {
                let text = filter
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |f| f.to_string());
                self.session.set_filter(filter);
                self.session.record(format!("Filter set to {text}"), true);
                false
            }
            ActionRequest::SetSort(sort) => {
                self.session.set_sort(sort);
                self.session.record(format!("Sort set to {sort}"), true);
                false
            }
        };

        if feedback && !self.settings.feedback_pause.is_zero() {
            let interrupted = self
                .caps
                .sleeper
                .sleep(self.settings.feedback_pause, &self.interrupt);
            if interrupted {
                self.terminate_on_interrupt();
                return ControllerState::Terminated;
            }
        }
        ControllerState::Sleeping
    }

    fn report(&mut self, message: &str, level: NoticeLevel, ok: bool) {
        self.caps.operator.notify(level, message);
        self.session.record(message, ok);
    }

    fn sleep(&mut self) -> ControllerState {
        self.cycles += 1;
        if self
            .settings
            .max_cycles
            .is_some_and(|max| self.cycles >= max)
        {
            debug!(cycles = self.cycles, "cycle limit reached");
            return ControllerState::Terminated;
        }
        if self.caps.sleeper.sleep(self.session.interval, &self.interrupt) {
            self.terminate_on_interrupt();
            return ControllerState::Terminated;
        }
        ControllerState::Displaying
    }
}

fn notice_level(outcome: &TerminationOutcome) -> NoticeLevel {
    match outcome {
        TerminationOutcome::Terminated => NoticeLevel::Success,
        TerminationOutcome::NotFound => NoticeLevel::Info,
        TerminationOutcome::AccessDenied | TerminationOutcome::Failed(_) => NoticeLevel::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TerminateError;
    use crate::collect::{ProcessStatus, RawEntry};
    use crate::testing::{
        raw_process, sample_entries, NoopSleeper, RecordingTerminator, ScriptedChooser,
        ScriptedOperator, ScriptedSource,
    };
    use crate::view::SortKey;
    use pm_common::ProcessId;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            feedback_pause: Duration::from_secs(1),
            max_cycles: None,
            system_summary: false,
        }
    }

    #[test]
    fn test_state_sequence_for_refresh() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(["", "q", "5"]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();
        let interrupt = Arc::new(AtomicBool::new(false));

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            interrupt,
        );

        assert_eq!(controller.state(), &ControllerState::Displaying);
        assert_eq!(controller.step().unwrap(), &ControllerState::AwaitingInteraction);
        assert_eq!(
            controller.step().unwrap(),
            &ControllerState::Acting(ActionRequest::Refresh)
        );
        assert_eq!(controller.step().unwrap(), &ControllerState::Sleeping);
        assert_eq!(controller.step().unwrap(), &ControllerState::Displaying);
        controller.step().unwrap();
        assert_eq!(
            controller.step().unwrap(),
            &ControllerState::Acting(ActionRequest::Quit)
        );
        assert_eq!(controller.step().unwrap(), &ControllerState::Terminated);
        assert_eq!(controller.cycles(), 1);
        drop(controller);

        // refresh never skips the interval sleep; quit does not sleep
        assert_eq!(sleeper.sleeps, vec![Duration::from_secs(2)]);
        assert_eq!(operator.screens.len(), 2);
        assert!(operator.screens[0].starts_with("=== Process Manager ==="));
    }

    #[test]
    fn test_terminate_one_then_feedback_pause_then_sleep() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::picks_line(0);
        let mut operator = ScriptedOperator::new(["y"]);
        let terminator =
            RecordingTerminator::with_outcomes([(1, Err(TerminateError::AccessDenied))]);
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            ControllerSettings {
                max_cycles: Some(1),
                ..settings()
            },
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let summary = controller.run().unwrap();
        assert_eq!(summary.cycles, 1);
        assert!(!summary.interrupted);
        let last = controller.session().last_action().unwrap().clone();
        drop(controller);

        assert_eq!(terminator.calls(), vec![ProcessId(1)]);
        assert_eq!(
            operator.notices,
            vec![(
                NoticeLevel::Error,
                "Access denied to terminate process 1.".to_string()
            )]
        );
        assert!(!last.ok);
        // limit reached before the interval sleep; only the feedback pause ran
        assert_eq!(sleeper.sleeps, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_first_scan_failure_is_fatal() {
        let source = ScriptedSource::failing("ps: command not found");
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(Vec::<String>::new());
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let err = controller.run().unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_later_scan_failure_is_reported() {
        let source = ScriptedSource::sequence(vec![
            Ok(sample_entries()),
            Err("ps vanished".to_string()),
        ]);
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(["", "", ""]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            ControllerSettings {
                max_cycles: Some(2),
                ..settings()
            },
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let summary = controller.run().unwrap();
        assert_eq!(summary.cycles, 2);
        drop(controller);

        assert_eq!(operator.notices.len(), 2);
        assert!(operator.notices[0].1.starts_with("Process enumeration failed"));
        // the empty second view skips the chooser
        assert_eq!(operator.notices[1].1, "No processes match the current view.");
        assert_eq!(chooser.calls, 1);
    }

    #[test]
    fn test_interrupt_during_sleep_terminates() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new([""]);
        let terminator = RecordingTerminator::default();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut sleeper = NoopSleeper::interrupting_after(1);

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            interrupt.clone(),
        );
        let summary = controller.run().unwrap();
        assert!(summary.interrupted);
        assert!(interrupt.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interrupt_before_step() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(Vec::<String>::new());
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            Arc::new(AtomicBool::new(true)),
        );
        assert_eq!(controller.step().unwrap(), &ControllerState::Terminated);
        drop(controller);
        assert!(operator.screens.is_empty());
    }

    #[test]
    fn test_set_sort_applies_next_cycle() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(["q", "7", "memory", "q", "5"]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        controller.run().unwrap();
        assert_eq!(controller.session().sort, SortKey::Memory);
        drop(controller);

        let second = &operator.screens[1];
        let pids: Vec<&str> = second
            .lines()
            .filter(|l| l.contains(" | "))
            .filter_map(|l| l.split('|').next())
            .map(str::trim)
            .filter(|s| s.chars().all(|c| c.is_ascii_digit()))
            .collect();
        assert_eq!(pids, vec!["50", "51", "1"]);
        // set_sort gives no feedback, so no pause
        assert_eq!(sleeper.sleeps, vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_failed_chooser_is_reported_and_loop_continues() {
        let source = ScriptedSource::always(sample_entries());
        let mut chooser = ScriptedChooser::declines().failing_first(1, Some(2));
        let mut operator = ScriptedOperator::new(["q", "5"]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let summary = controller.run().unwrap();
        assert_eq!(summary.cycles, 1);
        drop(controller);

        assert_eq!(chooser.calls, 2);
        assert_eq!(
            operator.notices[0],
            (
                NoticeLevel::Error,
                "Chooser failed: chooser exited with status Some(2)".to_string()
            )
        );
        // the failed round was a refresh: no menu prompt, interval sleep kept
        assert_eq!(operator.prompts[0], crate::select::OPEN_MENU_PROMPT);
        assert_eq!(operator.prompts.len(), 2);
        assert_eq!(sleeper.sleeps, vec![Duration::from_secs(2)]);
        assert_eq!(operator.screens.len(), 2);
    }

    #[test]
    fn test_interrupt_inside_chooser_ends_run_as_interrupted() {
        let source = ScriptedSource::always(sample_entries());
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut chooser = ScriptedChooser::declines().raising(interrupt.clone());
        let mut operator = ScriptedOperator::new(["q", "5"]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            settings(),
            Exporter::default(),
            interrupt,
        );
        let summary = controller.run().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.cycles, 0);
        drop(controller);

        assert!(operator.prompts.is_empty());
        assert!(operator.notices.is_empty());
        assert!(sleeper.sleeps.is_empty());
    }

    fn busy(cpu_secs: u64) -> Vec<RawEntry> {
        let mut raw = raw_process(70, "encoder", "alice", ProcessStatus::Running, 10.0, 99.0);
        raw.cpu_time = Some(Duration::from_secs(cpu_secs));
        vec![Ok(raw)]
    }

    #[test]
    fn test_process_cpu_comes_from_consecutive_snapshots() {
        let source = ScriptedSource::sequence(vec![Ok(busy(3_600)), Ok(busy(3_600))]);
        let mut chooser = ScriptedChooser::declines();
        let mut operator = ScriptedOperator::new(["", ""]);
        let terminator = RecordingTerminator::default();
        let mut sleeper = NoopSleeper::default();

        let mut controller = Controller::new(
            Capabilities {
                source: &source,
                chooser: &mut chooser,
                operator: &mut operator,
                terminator: &terminator,
                sleeper: &mut sleeper,
            },
            Session::default(),
            ControllerSettings {
                max_cycles: Some(2),
                ..settings()
            },
            Exporter::default(),
            Arc::new(AtomicBool::new(false)),
        );
        controller.run().unwrap();
        assert_eq!(controller.session.process_cpu().tracked(), 1);
        drop(controller);

        // an hour of past CPU time and none since: idle, not 99%
        for screen in &operator.screens {
            let row = screen.lines().find(|l| l.starts_with("70 ")).unwrap();
            assert!(row.contains("    0.0%"), "{row}");
        }
    }

    #[test]
    fn test_thread_sleeper_unbounded_duration_waits_for_flag() {
        let mut sleeper = ThreadSleeper {
            slice: Duration::from_millis(5),
        };
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        assert!(sleeper.sleep(Duration::from_secs(u64::MAX), &flag));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_thread_sleeper_observes_flag() {
        let mut sleeper = ThreadSleeper {
            slice: Duration::from_millis(5),
        };
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        assert!(sleeper.sleep(Duration::from_secs(5), &flag));
        assert!(start.elapsed() < Duration::from_secs(1));

        let flag = AtomicBool::new(false);
        assert!(!sleeper.sleep(Duration::from_millis(20), &flag));
    }
}
