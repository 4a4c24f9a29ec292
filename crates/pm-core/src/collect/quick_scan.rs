//! Process enumeration via the ps command.
//!
//! A single ps invocation with a custom format string, which is universally
//! available across Unix systems.
//!
//! # Platform Support
//! - Linux: procps-ng ps (`--no-headers`, wide user column)
//! - macOS: BSD ps (header line skipped, comm reduced to its basename)
//!
//! ps reports cumulative CPU time only to the second, so on Linux it is
//! refined from utime + stime in `/proc/<pid>/stat` when that is readable.

use super::types::{ProcessStatus, RawEntry, RawProcess, ReadError};
use super::ProcessSource;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, span, Level};

/// Fields after the pid: ppid user state time rss lstart(5 words) comm.
const MIN_FIELDS: usize = 12;
const LSTART_IDX: usize = 6;
const COMM_IDX: usize = LSTART_IDX + 5;
const LSTART_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Options for the ps-backed source.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Include kernel threads (Linux only).
    pub include_kernel_threads: bool,

    /// Timeout for the ps command.
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            include_kernel_threads: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Errors that make enumeration as a whole fail.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to execute ps command: {0}")]
    CommandFailed(String),

    #[error("ps command timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
}

impl From<ScanError> for pm_common::Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::UnsupportedPlatform(p) => pm_common::Error::UnsupportedPlatform(p),
            other => pm_common::Error::FatalStartup(other.to_string()),
        }
    }
}

/// Production process source backed by `ps`.
#[derive(Debug, Clone, Default)]
pub struct PsProcessSource {
    options: ScanOptions,
}

impl PsProcessSource {
    pub fn new(options: ScanOptions) -> Self {
        PsProcessSource { options }
    }
}

impl ProcessSource for PsProcessSource {
    fn enumerate(&self) -> Result<Vec<RawEntry>, ScanError> {
        let _span = span!(Level::DEBUG, "ps_scan").entered();
        let start = Instant::now();
        let platform = detect_platform();

        let mut cmd = build_ps_command(&platform)?;
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ScanError::CommandFailed(e.to_string()))?;

        let pid = child.id();
        let timeout = self.options.timeout;
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = finished.clone();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timed_out_clone = timed_out.clone();

        thread::spawn(move || {
            thread::sleep(timeout);
            if !finished_clone.load(Ordering::Relaxed) {
                timed_out_clone.store(true, Ordering::Relaxed);
                debug!("ps timed out, killing pid {}", pid);
                #[cfg(unix)]
                unsafe {
                    libc::kill(pid as i32, libc::SIGKILL);
                }
            }
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::CommandFailed("Failed to capture stdout".to_string()))?;

        let mut entries = Vec::new();
        let mut header_checked = false;
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if !header_checked {
                header_checked = true;
                if is_header_line(&line) {
                    continue;
                }
            }

            let mut entry = parse_ps_line(&line, &platform);
            if let Ok(raw) = &mut entry {
                if !self.options.include_kernel_threads && is_kernel_thread(raw) {
                    continue;
                }
                if let Some(precise) = raw.pid.and_then(read_stat_cpu_time) {
                    raw.cpu_time = Some(precise);
                }
            }
            entries.push(entry);
        }

        // Mark as finished before waiting, so the watchdog cannot hit a reused pid
        finished.store(true, Ordering::Relaxed);
        let status = child.wait()?;

        if timed_out.load(Ordering::Relaxed) {
            return Err(ScanError::Timeout(timeout));
        }
        if entries.is_empty() && !status.success() {
            return Err(ScanError::CommandFailed(format!("ps exited with {status}")));
        }

        debug!(
            entries = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "ps scan completed"
        );
        Ok(entries)
    }

    fn name(&self) -> &str {
        "ps"
    }
}

/// Detect the current platform.
fn detect_platform() -> String {
    #[cfg(target_os = "linux")]
    {
        "linux".to_string()
    }
    #[cfg(target_os = "macos")]
    {
        "macos".to_string()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        std::env::consts::OS.to_string()
    }
}

/// Build the ps command with platform-specific format string.
fn build_ps_command(platform: &str) -> Result<Command, ScanError> {
    let mut cmd = Command::new("ps");
    // lstart is locale dependent
    cmd.env("LC_ALL", "C");

    match platform {
        "linux" => {
            cmd.args([
                "-eo",
                "pid,ppid,user:32,state,time,rss,lstart,comm",
                "--no-headers",
            ]);
        }
        "macos" => {
            cmd.args(["-axo", "pid,ppid,user,state,time,rss,lstart,comm"]);
        }
        other => return Err(ScanError::UnsupportedPlatform(other.to_string())),
    }
    Ok(cmd)
}

fn is_header_line(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    matches!(
        (parts.next(), parts.next()),
        (Some("PID"), Some("PPID")) | (Some("pid"), Some("ppid"))
    )
}

/// Parse a single line of ps output.
///
/// A line whose pid cannot be read is a `ReadError`; any other damaged
/// column just leaves that field empty so normalization can decide.
fn parse_ps_line(line: &str, platform: &str) -> RawEntry {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let pid: u32 = fields
        .first()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ReadError {
            pid: None,
            reason: format!("invalid pid column in {line:?}"),
        })?;

    if fields.len() < MIN_FIELDS {
        debug!(pid, fields = fields.len(), "short ps line");
    }

    let ppid = fields.get(1).and_then(|f| f.parse().ok());
    let owner = fields.get(2).map(|f| f.to_string());
    let status = fields
        .get(3)
        .and_then(|f| f.chars().next())
        .map(ProcessStatus::from_state_char);
    let cpu_time = fields.get(4).and_then(|f| parse_cputime(f));
    // RSS is in KB
    let rss_bytes = fields
        .get(5)
        .and_then(|f| f.parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024));
    let created_at = fields
        .get(LSTART_IDX..COMM_IDX)
        .and_then(|parts| parse_lstart(&parts.join(" ")));

    let name = if fields.len() > COMM_IDX {
        let comm = fields[COMM_IDX..].join(" ");
        Some(match platform {
            "macos" => basename(&comm).to_string(),
            _ => comm,
        })
    } else {
        None
    };

    Ok(RawProcess {
        pid: Some(pid),
        ppid,
        name,
        owner,
        status,
        rss_bytes,
        cpu_percent: None,
        cpu_time,
        created_at,
    })
}

/// Parse ps `time`: "[DD-]HH:MM:SS" (procps) or "MM:SS.ss" (BSD).
fn parse_cputime(s: &str) -> Option<Duration> {
    let (days, clock) = match s.split_once('-') {
        Some((days, rest)) => (days.parse::<u64>().ok()?, rest),
        None => (0, s),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let mut secs = 0.0_f64;
    for part in parts {
        let value: f64 = part.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        secs = secs * 60.0 + value;
    }
    let days = Duration::from_secs(days.checked_mul(86_400)?);
    days.checked_add(Duration::try_from_secs_f64(secs).ok()?)
}

/// System clock ticks per second.
#[cfg(unix)]
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn clk_tck() -> u64 {
    static CLK_TCK: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *CLK_TCK.get_or_init(|| {
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            tck as u64
        } else {
            100
        }
    })
}

#[cfg(not(unix))]
fn clk_tck() -> u64 {
    100
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn ticks_to_duration(ticks: u64, tck: u64) -> Duration {
    let tck = tck.max(1);
    Duration::from_secs(ticks / tck) + Duration::from_nanos((ticks % tck) * 1_000_000_000 / tck)
}

/// utime + stime from `/proc/<pid>/stat` content.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat_cpu_time(content: &str) -> Option<Duration> {
    // comm may itself contain ") "
    let comm_end = content.rfind(')')?;
    let fields: Vec<&str> = content.get(comm_end + 2..)?.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(ticks_to_duration(utime.saturating_add(stime), clk_tck()))
}

#[cfg(target_os = "linux")]
fn read_stat_cpu_time(pid: u32) -> Option<Duration> {
    let content = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat_cpu_time(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_stat_cpu_time(_pid: u32) -> Option<Duration> {
    None
}

/// Parse lstart: "Wed Jan 14 10:30:00 2026".
fn parse_lstart(s: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(s, LSTART_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Detect kernel threads by PPID.
///
/// kthreadd has PPID 0 and every other kernel thread is its child (PPID 2).
/// PID 1 also has PPID 0 but is init.
fn is_kernel_thread(raw: &RawProcess) -> bool {
    if cfg!(not(target_os = "linux")) || raw.pid == Some(1) {
        return false;
    }
    matches!(raw.ppid, Some(0) | Some(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_header_detection() {
        assert!(is_header_line("  PID  PPID USER"));
        assert!(is_header_line("pid ppid user"));
        assert!(!is_header_line("123 1 root"));
    }

    #[test]
    fn test_parse_ps_line_linux() {
        let line = " 1234     1 testuser S 00:01:05 10240 Wed Jan 14 10:30:00 2026 bash";
        let raw = parse_ps_line(line, "linux").expect("parse");
        assert_eq!(raw.pid, Some(1234));
        assert_eq!(raw.ppid, Some(1));
        assert_eq!(raw.owner.as_deref(), Some("testuser"));
        assert_eq!(raw.status, Some(ProcessStatus::Sleeping));
        assert_eq!(raw.cpu_time, Some(Duration::from_secs(65)));
        assert_eq!(raw.cpu_percent, None);
        assert_eq!(raw.rss_bytes, Some(10240 * 1024));
        assert_eq!(raw.name.as_deref(), Some("bash"));

        let created = raw.created_at.expect("lstart parsed");
        assert_eq!(created.year(), 2026);
        assert_eq!(created.month(), 1);
        assert_eq!(created.day(), 14);
        assert_eq!(created.hour(), 10);
        assert_eq!(created.minute(), 30);
    }

    #[test]
    fn test_parse_ps_line_single_digit_day() {
        let line = "77 1 root Ss 00:00:00 512 Sun Mar  1 08:05:09 2026 sshd";
        let raw = parse_ps_line(line, "linux").unwrap();
        let created = raw.created_at.expect("lstart parsed");
        assert_eq!(created.day(), 1);
        assert_eq!(raw.status, Some(ProcessStatus::Sleeping));
    }

    #[test]
    fn test_parse_ps_line_name_with_spaces() {
        let line = "500 1 alice R 2-03:00:10 300000 Wed Jan 14 10:30:00 2026 Web Content";
        let raw = parse_ps_line(line, "linux").unwrap();
        assert_eq!(raw.name.as_deref(), Some("Web Content"));
        assert_eq!(raw.status, Some(ProcessStatus::Running));
        assert_eq!(raw.cpu_time, Some(Duration::from_secs(2 * 86_400 + 3 * 3600 + 10)));
    }

    #[test]
    fn test_parse_ps_line_macos_basename() {
        let line = concat!(
            "501 1 bob S 0:02.50 2048 Wed Jan 14 10:30:00 2026 ",
            "/Applications/Foo.app/Contents/MacOS/Foo"
        );
        let raw = parse_ps_line(line, "macos").unwrap();
        assert_eq!(raw.name.as_deref(), Some("Foo"));
        assert_eq!(raw.cpu_time, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_parse_cputime_forms() {
        assert_eq!(parse_cputime("00:00:03"), Some(Duration::from_secs(3)));
        assert_eq!(parse_cputime("01:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_cputime("12:34.5"), Some(Duration::from_millis(754_500)));
        assert_eq!(parse_cputime("1-00:00:00"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_cputime("0.5"), None);
        assert_eq!(parse_cputime("a:b"), None);
        assert_eq!(parse_cputime("-1:00"), None);
        assert_eq!(parse_cputime("inf:00"), None);
    }

    #[test]
    fn test_parse_stat_cpu_time() {
        // utime 500, stime 200
        let stat = "1234 (my (odd) name) S 1 1234 1234 0 -1 4194304 10 0 0 0 \
                    500 200 0 0 20 0 1 0 12345 0 0";
        let expected = ticks_to_duration(700, clk_tck());
        assert_eq!(parse_stat_cpu_time(stat), Some(expected));
        assert_eq!(parse_stat_cpu_time("1234 (bash) S 1"), None);
        assert_eq!(parse_stat_cpu_time("garbage"), None);
    }

    #[test]
    fn test_ticks_to_duration() {
        assert_eq!(ticks_to_duration(250, 100), Duration::from_millis(2500));
        assert_eq!(ticks_to_duration(0, 100), Duration::ZERO);
        assert_eq!(ticks_to_duration(3, 0), Duration::from_secs(3));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_read_stat_cpu_time_self() {
        assert!(read_stat_cpu_time(std::process::id()).is_some());
    }

    #[test]
    fn test_parse_ps_line_truncated_is_partial() {
        let raw = parse_ps_line("4321 1 carol", "linux").unwrap();
        assert_eq!(raw.pid, Some(4321));
        assert_eq!(raw.status, None);
        assert_eq!(raw.name, None);
        assert!(crate::collect::normalize(raw).is_none());
    }

    #[test]
    fn test_parse_ps_line_bad_pid_is_read_error() {
        let err = parse_ps_line("abc 1 root S", "linux").unwrap_err();
        assert_eq!(err.pid, None);
    }

    #[test]
    fn test_kernel_thread_detection() {
        let kworker = RawProcess {
            pid: Some(42),
            ppid: Some(2),
            ..RawProcess::default()
        };
        let init = RawProcess {
            pid: Some(1),
            ppid: Some(0),
            ..RawProcess::default()
        };
        let shell = RawProcess {
            pid: Some(900),
            ppid: Some(880),
            ..RawProcess::default()
        };
        assert_eq!(is_kernel_thread(&kworker), cfg!(target_os = "linux"));
        assert!(!is_kernel_thread(&init));
        assert!(!is_kernel_thread(&shell));
    }

    #[test]
    fn test_detect_platform() {
        assert!(!detect_platform().is_empty());
    }

    // Only meaningful where ps exists
    #[test]
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    fn test_nomock_scan_includes_self() {
        if Command::new("ps").arg("-p").arg("1").output().is_err() {
            return;
        }
        let source = PsProcessSource::default();
        let snapshot = crate::collect::list_processes(&source).expect("ps scan");
        let me = std::process::id();
        assert!(
            snapshot.records.iter().any(|r| r.pid.0 == me),
            "scan should include the test process"
        );
    }
}
