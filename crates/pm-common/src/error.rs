//! Error types for procman.
//!
//! The taxonomy mirrors how the refresh loop treats failures:
//! - per-process read failures are skipped silently
//! - termination failures are reported and the loop continues
//! - export failures are reported and the loop continues
//! - only a startup failure of process enumeration ends the program
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Permission Denied
//!   Reason: permission denied terminating process 1
//!   Fix: Re-run procman as the process owner or with elevated privileges
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for procman operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and argument errors.
    Config,
    /// Process enumeration errors.
    Collection,
    /// Termination errors.
    Action,
    /// File I/O errors (exports).
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Action => write!(f, "action"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Unified error type for procman.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// A single process vanished or was unreadable mid-scan.
    #[error("process {pid} could not be read: {reason}")]
    TransientRead { pid: u32, reason: String },

    /// The termination target had already exited.
    #[error("process {pid} does not exist")]
    ProcessNotFound { pid: u32 },

    #[error("permission denied terminating process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("action failed for process {pid}: {reason}")]
    ActionFailed { pid: u32, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The process enumeration facility is unavailable.
    #[error("process enumeration unavailable: {0}")]
    FatalStartup(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// - 10-19: Configuration errors
    /// - 20-29: Collection errors
    /// - 40-49: Action errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::TransientRead { .. } => 20,
            Error::FatalStartup(_) => 21,
            Error::ProcessNotFound { .. } => 40,
            Error::PermissionDenied { .. } => 41,
            Error::ActionFailed { .. } => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::TransientRead { .. } | Error::FatalStartup(_) => ErrorCategory::Collection,
            Error::ProcessNotFound { .. }
            | Error::PermissionDenied { .. }
            | Error::ActionFailed { .. } => ErrorCategory::Action,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Whether the refresh loop may continue after this error.
    ///
    /// Only an enumeration facility that is missing altogether (or an
    /// unsupported platform) stops the program.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::FatalStartup(_) | Error::UnsupportedPlatform(_))
    }

    /// Whether the error is informational rather than a failure.
    ///
    /// A termination target that already exited is the outcome the operator
    /// wanted.
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::ProcessNotFound { .. } | Error::TransientRead { .. })
    }

    /// Short headline for human output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::TransientRead { .. } => "Process Unreadable",
            Error::ProcessNotFound { .. } => "Process Already Gone",
            Error::PermissionDenied { .. } => "Permission Denied",
            Error::ActionFailed { .. } => "Action Failed",
            Error::Io(_) => "File Write Failed",
            Error::Json(_) => "Serialization Failed",
            Error::FatalStartup(_) => "Process Enumeration Unavailable",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the config file and --filter/--sort values",
            Error::TransientRead { .. } => "No action needed; the process is skipped",
            Error::ProcessNotFound { .. } => "No action needed; refresh the list",
            Error::PermissionDenied { .. } => {
                "Re-run procman as the process owner or with elevated privileges"
            }
            Error::ActionFailed { .. } => "Refresh the list and retry",
            Error::Io(_) => "Check free disk space and write permission on the export directory",
            Error::Json(_) => "Report this as a bug",
            Error::FatalStartup(_) => "Make sure `ps` is installed and on PATH",
            Error::UnsupportedPlatform(_) => "Run procman on Linux or macOS",
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
