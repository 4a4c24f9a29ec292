//! procman common types, IDs, and errors.
//!
//! This crate provides foundational types shared across pm-core modules:
//! - Process identity type
//! - The operator-facing error taxonomy
//! - Output format specifications for non-interactive commands

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result};
pub use id::ProcessId;
pub use output::OutputFormat;
