//! Stable event names and stages used as structured log fields.
//!
//! Event names are used as the tracing `target`, so JSON consumers can
//! filter on them without parsing messages.

use serde::{Deserialize, Serialize};

/// Phases of one refresh cycle, plus startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Taking a snapshot.
    Scan,
    /// Drawing the list and header.
    Display,
    /// Waiting on the operator.
    Interact,
    /// Carrying out an action.
    Act,
    /// Writing an export file.
    Export,
    /// Between cycles.
    Sleep,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Scan => "scan",
            Stage::Display => "display",
            Stage::Interact => "interact",
            Stage::Act => "act",
            Stage::Export => "export",
            Stage::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_INTERRUPTED: &str = "run.interrupted";

    // Scan
    pub const SCAN_FINISHED: &str = "scan.finished";
    pub const SCAN_FAILED: &str = "scan.failed";

    // Interaction
    pub const UI_SELECTION: &str = "ui.selection";
    pub const UI_MENU_CHOICE: &str = "ui.menu_choice";
    pub const UI_CHOOSER_FAILED: &str = "ui.chooser_failed";

    // Actions
    pub const ACTION_TERMINATE: &str = "action.terminate";
    pub const ACTION_BATCH: &str = "action.batch";
    pub const EXPORT_WRITTEN: &str = "export.written";

    // Controller
    pub const LOOP_STATE: &str = "loop.state";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
}
