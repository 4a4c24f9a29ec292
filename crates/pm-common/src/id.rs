//! Process identity type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Process ID wrapper with display formatting.
///
/// Only positive values are valid; pid 0 is the scheduler and never appears
/// in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Build a pid, rejecting zero.
    pub fn new(pid: u32) -> Option<Self> {
        (pid > 0).then_some(ProcessId(pid))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl FromStr for ProcessId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("not a pid: {trimmed:?}"));
        }
        let value: u32 = trimmed
            .parse()
            .map_err(|_| format!("pid out of range: {trimmed}"))?;
        ProcessId::new(value).ok_or_else(|| "pid must be positive".to_string())
    }
}
