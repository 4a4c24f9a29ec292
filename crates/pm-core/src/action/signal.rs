//! Signal-based termination.
//!
//! SIGTERM first; with `force` set, a process still alive after the grace
//! period gets SIGKILL.

use super::{TerminateError, Terminator};
use pm_common::ProcessId;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalConfig {
    /// Escalate to SIGKILL when SIGTERM is ignored.
    pub force: bool,
    /// Grace period after SIGTERM before escalating.
    pub grace_ms: u64,
    /// Polling interval while waiting for exit.
    pub poll_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            force: false,
            grace_ms: 3_000,
            poll_ms: 50,
        }
    }
}

#[derive(Debug, Default)]
pub struct SignalTerminator {
    config: SignalConfig,
}

impl SignalTerminator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    #[cfg(unix)]
    fn send_signal(&self, pid: ProcessId, signal: i32) -> Result<(), TerminateError> {
        // a value above i32::MAX would wrap negative and address a process group
        let target = i32::try_from(pid.0).map_err(|_| TerminateError::NoSuchProcess)?;

        let result = unsafe { libc::kill(target, signal) };
        if result == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(TerminateError::NoSuchProcess),
            Some(libc::EPERM) => Err(TerminateError::AccessDenied),
            _ => Err(TerminateError::Failed(err.to_string())),
        }
    }

    #[cfg(unix)]
    fn process_exists(&self, pid: ProcessId) -> bool {
        let Ok(target) = i32::try_from(pid.0) else {
            return false;
        };
        if unsafe { libc::kill(target, 0) } == 0 {
            return true;
        }
        // EPERM means it exists but belongs to someone else
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(unix)]
    fn wait_for_exit(&self, pid: ProcessId, timeout: Duration) -> bool {
        let start = Instant::now();
        let poll = Duration::from_millis(self.config.poll_ms.max(1));
        while start.elapsed() < timeout {
            if !self.process_exists(pid) {
                return true;
            }
            thread::sleep(poll);
        }
        !self.process_exists(pid)
    }
}

#[cfg(unix)]
impl Terminator for SignalTerminator {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminateError> {
        self.send_signal(pid, libc::SIGTERM)?;
        if !self.config.force {
            return Ok(());
        }

        if self.wait_for_exit(pid, Duration::from_millis(self.config.grace_ms)) {
            return Ok(());
        }
        debug!(pid = pid.0, "SIGTERM ignored; escalating to SIGKILL");
        match self.send_signal(pid, libc::SIGKILL) {
            // exited between the last poll and SIGKILL
            Err(TerminateError::NoSuchProcess) => Ok(()),
            other => other,
        }
    }
}

#[cfg(not(unix))]
impl Terminator for SignalTerminator {
    fn terminate(&self, _pid: ProcessId) -> Result<(), TerminateError> {
        Err(TerminateError::Failed(
            "signals not supported on this platform".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_config_defaults() {
        let config = SignalConfig::default();
        assert!(!config.force);
        assert_eq!(config.grace_ms, 3_000);
        assert_eq!(config.poll_ms, 50);
    }

    #[cfg(unix)]
    mod unix_tests {
        use super::*;
        use std::process::Command;

        #[test]
        fn process_exists_for_self() {
            let terminator = SignalTerminator::default();
            assert!(terminator.process_exists(ProcessId(std::process::id())));
        }

        #[test]
        fn nonexistent_pid_is_no_such_process() {
            let terminator = SignalTerminator::default();
            assert_eq!(
                terminator.terminate(ProcessId(999_999_999)),
                Err(TerminateError::NoSuchProcess)
            );
        }

        #[test]
        fn pid_above_i32_range_is_no_such_process() {
            let terminator = SignalTerminator::default();
            assert_eq!(
                terminator.terminate(ProcessId(u32::MAX)),
                Err(TerminateError::NoSuchProcess)
            );
        }

        #[test]
        fn can_terminate_child() {
            let mut child = Command::new("sleep")
                .arg("60")
                .spawn()
                .expect("failed to spawn sleep");
            let pid = ProcessId(child.id());

            let terminator = SignalTerminator::default();
            assert_eq!(terminator.terminate(pid), Ok(()));

            let status = child.wait().expect("wait failed");
            assert!(!status.success());
        }

        #[test]
        fn force_escalates_when_term_is_ignored() {
            let mut child = Command::new("sh")
                .arg("-c")
                .arg("trap '' TERM; exec sleep 60")
                .spawn()
                .expect("failed to spawn sh");
            let pid = ProcessId(child.id());
            // let the shell install its trap
            thread::sleep(Duration::from_millis(200));

            let terminator = SignalTerminator::new(SignalConfig {
                force: true,
                grace_ms: 200,
                poll_ms: 10,
            });
            assert_eq!(terminator.terminate(pid), Ok(()));

            let status = child.wait().expect("wait failed");
            assert!(status.code().is_none(), "expected death by signal");
        }
    }
}
