//! fzf as the interactive chooser.

use super::{Chooser, ChooserError};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::trace;

/// Arguments passed to fzf on every invocation.
pub const FZF_ARGS: [&str; 6] = [
    "--ansi",
    "--height",
    "40%",
    "--reverse",
    "--color",
    "fg:#bbccdd,bg:#334455,hl:#ffcc00,fg+:#ffffff,bg+:#556677,hl+:#ffdd00",
];

/// Runs fzf with the rendered list on stdin and reads the chosen line from
/// stdout. Exit status 1 (no match) and 130 (escape / Ctrl-C) mean nothing
/// was chosen.
#[derive(Debug, Clone)]
pub struct FzfChooser {
    program: PathBuf,
    args: Vec<String>,
}

impl Default for FzfChooser {
    fn default() -> Self {
        Self::new("fzf")
    }
}

impl FzfChooser {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: FZF_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Replace the default fzf arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Map an fzf exit to a choice.
pub(crate) fn interpret_exit(
    code: Option<i32>,
    stdout: &[u8],
) -> Result<Option<String>, ChooserError> {
    match code {
        Some(0) => {
            let line = String::from_utf8_lossy(stdout).trim().to_string();
            Ok((!line.is_empty()).then_some(line))
        }
        Some(1) | Some(130) => Ok(None),
        other => Err(ChooserError::Failed { code: other }),
    }
}

impl Chooser for FzfChooser {
    fn choose(&mut self, lines: &[String]) -> Result<Option<String>, ChooserError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ChooserError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = lines.join("\n");
            // fzf may exit before reading everything (e.g. immediate escape)
            match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }

        let output = child.wait_with_output()?;
        trace!(code = ?output.status.code(), "fzf exited");
        interpret_exit(output.status.code(), &output.stdout)
    }

    fn name(&self) -> &str {
        "fzf"
    }
}
