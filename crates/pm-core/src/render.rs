//! Text rendering of views, headers and menus.
//!
//! The row format is shared by the interactive list, the chooser input and
//! the text exporter, so a chosen line always leads with its pid.

use crate::collect::{ProcessRecord, Snapshot, SystemSummary};
use crate::view::{FilterSpec, SnapshotView, SortKey};
use chrono::{DateTime, Local};
use pm_common::ProcessId;
use serde::Serialize;
use std::fmt::Write as _;

/// Timestamp format used in rows and exports.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";

/// ANSI styling that collapses to plain text when color is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_color(&self) -> bool {
        self.color
    }

    fn paint(&self, codes: &str, text: &str) -> String {
        if self.color {
            format!("{codes}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn title(&self, text: &str) -> String {
        self.paint(&format!("{BOLD}{BLUE}"), text)
    }

    pub fn info(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }

    pub fn metric(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    pub fn hint(&self, text: &str) -> String {
        self.paint(MAGENTA, text)
    }

    pub fn success(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    pub fn failure(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

pub fn format_created(created_at: Option<&DateTime<Local>>) -> String {
    match created_at {
        Some(ts) => ts.format(CREATED_FORMAT).to_string(),
        None => "unknown".to_string(),
    }
}

/// One pipe-delimited, fixed-width row.
pub fn format_row(record: &ProcessRecord) -> String {
    format!(
        "{:<8} | {:<20} | {:<15} | {:<10} | {:>8.2} MB | {:>6.1}% | {}",
        record.pid.0,
        record.name,
        record.owner,
        record.status.as_str(),
        record.memory_mb(),
        record.cpu_percent,
        format_created(record.created_at.as_ref()),
    )
}

pub fn render_lines(view: &SnapshotView<'_>) -> Vec<String> {
    view.iter().map(format_row).collect()
}

/// Pid in the leading `|`-delimited field of a rendered row.
pub fn parse_pid_from_line(line: &str) -> Option<ProcessId> {
    line.split('|').next()?.trim().parse().ok()
}

/// Everything the header shows besides the list itself.
#[derive(Debug, Clone)]
pub struct HeaderInfo<'a> {
    pub summary: SystemSummary,
    pub interval_secs: u64,
    pub sort: SortKey,
    pub filter: Option<&'a FilterSpec>,
    pub shown: usize,
    pub total: usize,
    pub last_action: Option<&'a str>,
}

fn or_na(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".to_string(),
    }
}

pub fn render_header(info: &HeaderInfo<'_>, palette: &Palette) -> String {
    let filter = info
        .filter
        .map_or_else(|| "none".to_string(), |f| f.to_string());
    let s = &info.summary;

    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.title("=== Process Manager ==="));
    let _ = writeln!(
        out,
        "{}",
        palette.info(&format!(
            "Refresh Interval: {} seconds | Sort By: {} | Filter: {} | Showing: {}/{}",
            info.interval_secs, info.sort, filter, info.shown, info.total
        ))
    );
    let _ = writeln!(
        out,
        "{}",
        palette.metric(&format!(
            "Memory Usage: {} MB / {} MB | CPU Usage: {}% | Disk Usage: {}%",
            or_na(s.memory_used_mb, 2),
            or_na(s.memory_total_mb, 2),
            or_na(s.cpu_percent, 1),
            or_na(s.disk_percent, 1),
        ))
    );
    if let Some(last) = info.last_action {
        let _ = writeln!(out, "{}", palette.hint(&format!("Last action: {last}")));
    }
    let _ = writeln!(out, "{}", palette.hint("Press 'q' to open options menu"));
    let _ = write!(out, "{}", palette.hint("----------------------------------------"));
    out
}

pub const MENU_ENTRIES: [&str; 7] = [
    "Refresh Process List",
    "Save Current Output",
    "Kill Multiple Processes",
    "Export to CSV",
    "Quit",
    "Change Filter",
    "Change Sort",
];

pub fn render_menu(palette: &Palette) -> String {
    let mut out = palette.title("=== Options Menu ===");
    for (i, entry) in MENU_ENTRIES.iter().enumerate() {
        out.push('\n');
        out.push_str(&palette.info(&format!("{}. {entry}", i + 1)));
    }
    out
}

/// Markdown table of a view.
pub fn render_markdown(view: &SnapshotView<'_>) -> String {
    let mut out = String::from(
        "| PID | Name | Owner | Status | Memory (MB) | CPU (%) | Created |\n\
         |----:|------|-------|--------|------------:|--------:|---------|\n",
    );
    for r in view.iter() {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {:.2} | {:.1} | {} |",
            r.pid,
            r.name.replace('|', "\\|"),
            r.owner.replace('|', "\\|"),
            r.status,
            r.memory_mb(),
            r.cpu_percent,
            format_created(r.created_at.as_ref()),
        );
    }
    out
}

#[derive(Serialize)]
struct ListPayload<'a> {
    taken_at: String,
    filter: Option<String>,
    sort: SortKey,
    total: usize,
    skipped: usize,
    processes: Vec<&'a ProcessRecord>,
}

/// JSON document of a view, with the snapshot metadata around it.
pub fn render_json(
    snapshot: &Snapshot,
    view: &SnapshotView<'_>,
    filter: Option<&FilterSpec>,
    sort: SortKey,
) -> serde_json::Result<String> {
    let payload = ListPayload {
        taken_at: snapshot.taken_at.to_rfc3339(),
        filter: filter.map(ToString::to_string),
        sort,
        total: snapshot.len(),
        skipped: snapshot.skipped,
        processes: view.rows().to_vec(),
    };
    serde_json::to_string_pretty(&payload)
}

/// One line: counts per status plus the top memory consumer.
pub fn render_summary(snapshot: &Snapshot, view: &SnapshotView<'_>) -> String {
    use crate::collect::ProcessStatus;

    let counts: Vec<String> = ProcessStatus::ALL
        .iter()
        .filter_map(|status| {
            let n = view.iter().filter(|r| r.status == *status).count();
            (n > 0).then(|| format!("{n} {status}"))
        })
        .collect();
    let top = view
        .iter()
        .max_by_key(|r| r.resident_memory_bytes)
        .map(|r| format!("; top memory: {} ({}) {:.2} MB", r.name, r.pid, r.memory_mb()))
        .unwrap_or_default();
    format!(
        "{} of {} processes shown ({}){}",
        view.len(),
        snapshot.len(),
        if counts.is_empty() {
            "none".to_string()
        } else {
            counts.join(", ")
        },
        top
    )
}
