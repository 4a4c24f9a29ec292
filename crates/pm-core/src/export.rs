//! Snapshot exporters.
//!
//! Files are named `process_list_<%Y-%m-%d_%H-%M-%S>.{txt,csv}` in local
//! time and written with a single full overwrite.

use crate::logging::event_names;
use crate::render::{format_created, format_row};
use crate::view::SnapshotView;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CSV_HEADER: &str =
    "PID,Name,Username,Status,Memory Usage (MB),CPU Usage (%),Creation Time";

const FILE_STEM: &str = "process_list";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Display rows, one per line
    Text,
    /// Seven-column CSV with header
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
        }
    }

    /// Operator-facing confirmation for a written file.
    pub fn success_message(&self, path: &Path) -> String {
        match self {
            ExportFormat::Text => format!("Process list saved to {}.", path.display()),
            ExportFormat::Csv => format!("Process list exported to {}.", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ExportError> for pm_common::Error {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Io { path, source } => pm_common::Error::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {source}", path.display()),
            )),
        }
    }
}

pub fn timestamped_filename(format: ExportFormat, now: DateTime<Local>) -> String {
    format!(
        "{FILE_STEM}_{}.{}",
        now.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Quote a CSV field when it contains a comma, quote or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn text_content(view: &SnapshotView<'_>) -> String {
    view.iter().map(format_row).collect::<Vec<_>>().join("\n")
}

pub fn csv_content(view: &SnapshotView<'_>) -> String {
    let mut out = String::with_capacity(64 * (view.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in view.iter() {
        let _ = writeln!(
            out,
            "{},{},{},{},{:.2},{:.1},{}",
            r.pid,
            csv_escape(&r.name),
            csv_escape(&r.owner),
            r.status,
            r.memory_mb(),
            r.cpu_percent,
            format_created(r.created_at.as_ref()),
        );
    }
    out
}

/// Writes exports into one directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Default for Exporter {
    /// The current working directory.
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn export(
        &self,
        format: ExportFormat,
        view: &SnapshotView<'_>,
    ) -> Result<PathBuf, ExportError> {
        self.export_at(format, view, Local::now())
    }

    pub fn export_text(&self, view: &SnapshotView<'_>) -> Result<PathBuf, ExportError> {
        self.export(ExportFormat::Text, view)
    }

    pub fn export_table(&self, view: &SnapshotView<'_>) -> Result<PathBuf, ExportError> {
        self.export(ExportFormat::Csv, view)
    }

    /// Export with an explicit timestamp for the filename.
    pub fn export_at(
        &self,
        format: ExportFormat,
        view: &SnapshotView<'_>,
        now: DateTime<Local>,
    ) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(timestamped_filename(format, now));
        let content = match format {
            ExportFormat::Text => text_content(view),
            ExportFormat::Csv => csv_content(view),
        };
        std::fs::write(&path, content).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        info!(
            target: event_names::EXPORT_WRITTEN,
            path = %path.display(),
            format = format.extension(),
            rows = view.len(),
            "export written"
        );
        Ok(path)
    }
}
