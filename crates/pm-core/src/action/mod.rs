//! Process termination.
//!
//! The `Terminator` trait is the only way procman changes OS state. Every
//! outcome is classified and reported; nothing here aborts the refresh loop.

mod signal;

pub use signal::{SignalConfig, SignalTerminator};

use crate::logging::event_names;
use pm_common::ProcessId;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Why a termination request did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminateError {
    /// The target had already exited.
    #[error("no such process")]
    NoSuchProcess,
    #[error("access denied")]
    AccessDenied,
    #[error("termination failed: {0}")]
    Failed(String),
}

/// Something that can end a process.
pub trait Terminator {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminateError>;
}

impl<T: Terminator + ?Sized> Terminator for &T {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminateError> {
        (**self).terminate(pid)
    }
}

/// Classified result of one termination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum TerminationOutcome {
    Terminated,
    /// Already gone; equivalent to success for the operator.
    NotFound,
    AccessDenied,
    Failed(String),
}

impl TerminationOutcome {
    /// Whether the operator got what they asked for.
    pub fn is_ok(&self) -> bool {
        matches!(self, TerminationOutcome::Terminated | TerminationOutcome::NotFound)
    }

    /// Operator-facing message for `pid`.
    pub fn message(&self, pid: ProcessId) -> String {
        match self {
            TerminationOutcome::Terminated => format!("Process {pid} terminated."),
            TerminationOutcome::NotFound => format!("Process {pid} does not exist."),
            TerminationOutcome::AccessDenied => {
                format!("Access denied to terminate process {pid}.")
            }
            TerminationOutcome::Failed(reason) => {
                format!("Failed to terminate process {pid}: {reason}")
            }
        }
    }

    /// The error this outcome corresponds to, if any.
    pub fn to_error(&self, pid: ProcessId) -> Option<pm_common::Error> {
        match self {
            TerminationOutcome::Terminated => None,
            TerminationOutcome::NotFound => Some(pm_common::Error::ProcessNotFound { pid: pid.0 }),
            TerminationOutcome::AccessDenied => {
                Some(pm_common::Error::PermissionDenied { pid: pid.0 })
            }
            TerminationOutcome::Failed(reason) => Some(pm_common::Error::ActionFailed {
                pid: pid.0,
                reason: reason.clone(),
            }),
        }
    }
}

impl From<Result<(), TerminateError>> for TerminationOutcome {
    fn from(result: Result<(), TerminateError>) -> Self {
        match result {
            Ok(()) => TerminationOutcome::Terminated,
            Err(TerminateError::NoSuchProcess) => TerminationOutcome::NotFound,
            Err(TerminateError::AccessDenied) => TerminationOutcome::AccessDenied,
            Err(TerminateError::Failed(reason)) => TerminationOutcome::Failed(reason),
        }
    }
}

/// Request termination of one process and classify the result.
pub fn terminate_one(terminator: &dyn Terminator, pid: ProcessId) -> TerminationOutcome {
    let outcome = TerminationOutcome::from(terminator.terminate(pid));
    match outcome.to_error(pid) {
        Some(err) if !err.is_benign() => warn!(
            target: event_names::ACTION_TERMINATE,
            pid = pid.0,
            code = err.code(),
            error = %err,
            "terminate failed"
        ),
        _ => info!(
            target: event_names::ACTION_TERMINATE,
            pid = pid.0,
            outcome = ?outcome,
            "terminate"
        ),
    }
    outcome
}

/// Per-pid results of a batch termination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<(ProcessId, TerminationOutcome)>,

    /// Input tokens that were not valid pids.
    pub malformed: Vec<String>,
}

impl BatchOutcome {
    pub fn all_ok(&self) -> bool {
        self.malformed.is_empty() && self.results.iter().all(|(_, o)| o.is_ok())
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, o)| !o.is_ok()).count()
    }

    /// One message per pid in request order, then one per malformed token.
    pub fn messages(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .results
            .iter()
            .map(|(pid, outcome)| outcome.message(*pid))
            .collect();
        lines.extend(
            self.malformed
                .iter()
                .map(|token| format!("Ignoring invalid PID {token:?}.")),
        );
        lines
    }
}

/// Terminate every pid in order. A failure never stops later pids.
pub fn terminate_many(terminator: &dyn Terminator, pids: &[ProcessId]) -> BatchOutcome {
    let results: Vec<(ProcessId, TerminationOutcome)> = pids
        .iter()
        .map(|&pid| (pid, terminate_one(terminator, pid)))
        .collect();
    let batch = BatchOutcome {
        results,
        malformed: Vec::new(),
    };
    info!(
        target: event_names::ACTION_BATCH,
        requested = pids.len(),
        failed = batch.failed(),
        "batch terminate finished"
    );
    batch
}

/// Split a comma-separated pid list into valid pids and rejected tokens.
///
/// Blank tokens are ignored; duplicates are kept once, first position wins.
pub fn parse_pid_list(input: &str) -> (Vec<ProcessId>, Vec<String>) {
    let mut pids = Vec::new();
    let mut malformed = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<ProcessId>() {
            Ok(pid) if !pids.contains(&pid) => pids.push(pid),
            Ok(_) => {}
            Err(_) => malformed.push(token.to_string()),
        }
    }
    (pids, malformed)
}
