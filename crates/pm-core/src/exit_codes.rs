//! Exit codes for the procman CLI.
//!
//! Exit code ranges:
//! - 0-9: operational outcomes
//! - 10-19: user/environment errors (recoverable by user action)
//! - 20-29: internal errors
//!
//! An interrupted interactive session exits `Clean`.

use pm_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success, including a Ctrl-C out of the refresh loop.
    Clean = 0,

    /// `kill`: at least one pid could not be terminated.
    PartialFail = 3,

    /// Invalid arguments or configuration.
    ArgsError = 10,

    /// Process enumeration is unavailable (no `ps`, unsupported platform).
    CapabilityError = 11,

    PermissionError = 12,

    /// Internal error (bug - please report)
    InternalError = 20,

    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes 10-19, resolvable by the user.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for an error that ended the program.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ArgsError,
            Error::FatalStartup(_) | Error::UnsupportedPlatform(_) => ExitCode::CapabilityError,
            Error::PermissionDenied { .. } => ExitCode::PermissionError,
            Error::Io(_) => ExitCode::IoError,
            Error::ProcessNotFound { .. } | Error::ActionFailed { .. } => ExitCode::PartialFail,
            Error::TransientRead { .. } | Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
