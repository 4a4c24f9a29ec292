//! Selection and the options menu.
//!
//! One interactive round turns the rendered view into exactly one
//! [`ActionRequest`]. The chooser and the operator terminal are capabilities
//! so the round can be scripted in tests.

mod fzf;
mod prompt;
mod terminal;

pub use fzf::{FzfChooser, FZF_ARGS};
pub use prompt::{PromptChooser, CHOOSE_PROMPT};
pub use terminal::{BufLines, LineInput, StdinLines, TerminalOperator};

use crate::action::parse_pid_list;
use crate::export::ExportFormat;
use crate::logging::event_names;
use crate::render::{parse_pid_from_line, render_menu, Palette};
use crate::view::{FilterSpec, SortKey};
use pm_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIRM_KILL_PROMPT: &str = "Do you want to kill this process? (y/n): ";
pub const OPEN_MENU_PROMPT: &str = "Press 'q' to open options menu or any other key to continue: ";
pub const MENU_PROMPT: &str = "Enter your choice (1-7): ";
pub const PID_LIST_PROMPT: &str = "Enter PIDs to kill (comma-separated): ";
pub const FILTER_PROMPT: &str =
    "Enter filter as field=value (status, name, owner; empty to clear): ";
pub const SORT_PROMPT: &str = "Enter sort key (pid, name, memory, cpu): ";

#[derive(Debug, Error)]
pub enum ChooserError {
    #[error("failed to start chooser {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chooser exited with status {code:?}")]
    Failed { code: Option<i32> },

    #[error("chooser I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lets the operator pick one line of the rendered list.
pub trait Chooser {
    /// `Ok(None)` is an explicit "nothing chosen".
    fn choose(&mut self, lines: &[String]) -> Result<Option<String>, ChooserError>;

    fn name(&self) -> &str {
        "chooser"
    }
}

/// Severity of an operator-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// The operator's terminal: screens, notices and line prompts.
pub trait Operator {
    /// Show a prompt and read one line. `Ok(None)` on end of input.
    fn prompt(&mut self, message: &str) -> std::io::Result<Option<String>>;

    fn notify(&mut self, level: NoticeLevel, message: &str);

    /// Replace the screen with `screen`.
    fn display(&mut self, screen: &str);

    /// Print `text` below whatever is on screen.
    fn show(&mut self, text: &str);

    fn palette(&self) -> Palette {
        Palette::plain()
    }
}

/// Result of asking the chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected(ProcessId),
    /// The operator dismissed the chooser.
    Declined,
    /// There was nothing to choose from; the chooser was not shown.
    EmptyView,
}

/// Options menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Refresh,
    SaveText,
    KillMany,
    ExportCsv,
    Quit,
    ChangeFilter,
    ChangeSort,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Refresh),
            "2" => Some(MenuChoice::SaveText),
            "3" => Some(MenuChoice::KillMany),
            "4" => Some(MenuChoice::ExportCsv),
            "5" => Some(MenuChoice::Quit),
            "6" => Some(MenuChoice::ChangeFilter),
            "7" => Some(MenuChoice::ChangeSort),
            _ => None,
        }
    }
}

/// What one interactive round asks the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    TerminateOne(ProcessId),
    TerminateMany {
        pids: Vec<ProcessId>,
        /// Tokens that were not pids; reported, never acted on.
        malformed: Vec<String>,
    },
    Export(ExportFormat),
    SetFilter(Option<FilterSpec>),
    SetSort(SortKey),
    Refresh,
    Quit,
}

impl ActionRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionRequest::TerminateOne(_) => "terminate_one",
            ActionRequest::TerminateMany { .. } => "terminate_many",
            ActionRequest::Export(_) => "export",
            ActionRequest::SetFilter(_) => "set_filter",
            ActionRequest::SetSort(_) => "set_sort",
            ActionRequest::Refresh => "refresh",
            ActionRequest::Quit => "quit",
        }
    }
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Chooser(#[from] ChooserError),

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SelectError> for pm_common::Error {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::Chooser(ChooserError::Io(e)) | SelectError::Io(e) => {
                pm_common::Error::Io(e)
            }
            SelectError::Chooser(other) => pm_common::Error::Io(std::io::Error::other(other)),
        }
    }
}

/// Which chooser to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChooserKind {
    /// fzf when it is on PATH, otherwise the built-in prompt
    #[default]
    Auto,
    Fzf,
    Prompt,
}

impl std::fmt::Display for ChooserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChooserKind::Auto => "auto",
            ChooserKind::Fzf => "fzf",
            ChooserKind::Prompt => "prompt",
        })
    }
}

/// First `program` found in the directories of `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Build the chooser for `kind`, reading from the process's stdin.
pub fn build_chooser(kind: ChooserKind, palette: Palette) -> Box<dyn Chooser> {
    match kind {
        ChooserKind::Fzf => Box::new(FzfChooser::default()),
        ChooserKind::Prompt => Box::new(PromptChooser::stdio(palette)),
        ChooserKind::Auto => match find_on_path("fzf") {
            Some(path) => {
                debug!(path = %path.display(), "using fzf chooser");
                Box::new(FzfChooser::new(path))
            }
            None => {
                warn!("fzf not found on PATH; falling back to the built-in prompt");
                Box::new(PromptChooser::stdio(palette))
            }
        },
    }
}

/// Ask the chooser for a pid. An empty list never reaches the chooser.
pub fn choose_process(
    lines: &[String],
    chooser: &mut dyn Chooser,
) -> Result<Selection, ChooserError> {
    if lines.is_empty() {
        return Ok(Selection::EmptyView);
    }
    let selection = match chooser.choose(lines)? {
        Some(line) => match parse_pid_from_line(&line) {
            Some(pid) => Selection::Selected(pid),
            None => {
                warn!(line = %line, "chosen line has no leading pid");
                Selection::Declined
            }
        },
        None => Selection::Declined,
    };
    debug!(target: event_names::UI_SELECTION, chooser = chooser.name(), ?selection, "selection");
    Ok(selection)
}

/// Run one interactive round over the rendered `lines`.
///
/// End of input at any prompt is treated as a request to quit, and so is an
/// interrupt raised while the chooser had the terminal.
pub fn select_and_act(
    lines: &[String],
    chooser: &mut dyn Chooser,
    operator: &mut dyn Operator,
    interrupt: &AtomicBool,
) -> Result<ActionRequest, SelectError> {
    let selection = choose_process(lines, chooser)?;
    if interrupt.load(Ordering::SeqCst) {
        debug!("interrupted while choosing");
        return Ok(ActionRequest::Quit);
    }

    match selection {
        Selection::Selected(pid) => {
            let question = format!("Selected PID: {pid}. {CONFIRM_KILL_PROMPT}");
            let Some(answer) = operator.prompt(&question)? else {
                return Ok(ActionRequest::Quit);
            };
            if answer.trim().eq_ignore_ascii_case("y") {
                Ok(ActionRequest::TerminateOne(pid))
            } else {
                Ok(ActionRequest::Refresh)
            }
        }
        selection @ (Selection::Declined | Selection::EmptyView) => {
            if selection == Selection::EmptyView {
                operator.notify(NoticeLevel::Info, "No processes match the current view.");
            }
            let Some(answer) = operator.prompt(OPEN_MENU_PROMPT)? else {
                return Ok(ActionRequest::Quit);
            };
            if answer.trim().eq_ignore_ascii_case("q") {
                options_menu(operator)
            } else {
                Ok(ActionRequest::Refresh)
            }
        }
    }
}

/// Show the options menu and turn the operator's answer into a request.
pub fn options_menu(operator: &mut dyn Operator) -> Result<ActionRequest, SelectError> {
    let menu = render_menu(&operator.palette());
    operator.show(&menu);
    let Some(answer) = operator.prompt(MENU_PROMPT)? else {
        return Ok(ActionRequest::Quit);
    };

    let Some(choice) = MenuChoice::parse(&answer) else {
        operator.notify(NoticeLevel::Error, "Invalid choice.");
        return Ok(ActionRequest::Refresh);
    };
    debug!(target: event_names::UI_MENU_CHOICE, ?choice, "menu choice");

    let request = match choice {
        MenuChoice::Refresh => ActionRequest::Refresh,
        MenuChoice::SaveText => ActionRequest::Export(ExportFormat::Text),
        MenuChoice::ExportCsv => ActionRequest::Export(ExportFormat::Csv),
        MenuChoice::Quit => ActionRequest::Quit,
        MenuChoice::KillMany => {
            let Some(input) = operator.prompt(PID_LIST_PROMPT)? else {
                return Ok(ActionRequest::Quit);
            };
            let (pids, malformed) = parse_pid_list(&input);
            ActionRequest::TerminateMany { pids, malformed }
        }
        MenuChoice::ChangeFilter => {
            let Some(input) = operator.prompt(FILTER_PROMPT)? else {
                return Ok(ActionRequest::Quit);
            };
            let input = input.trim();
            if input.is_empty() || input.eq_ignore_ascii_case("none") {
                ActionRequest::SetFilter(None)
            } else {
                match input.parse::<FilterSpec>() {
                    Ok(filter) => ActionRequest::SetFilter(Some(filter)),
                    Err(reason) => {
                        operator.notify(NoticeLevel::Error, &format!("Invalid filter: {reason}"));
                        ActionRequest::Refresh
                    }
                }
            }
        }
        MenuChoice::ChangeSort => {
            let Some(input) = operator.prompt(SORT_PROMPT)? else {
                return Ok(ActionRequest::Quit);
            };
            match input.parse::<SortKey>() {
                Ok(sort) => ActionRequest::SetSort(sort),
                Err(reason) => {
                    operator.notify(NoticeLevel::Error, &format!("Invalid sort: {reason}"));
                    ActionRequest::Refresh
                }
            }
        }
    };
    Ok(request)
}
