//! The stdin/stdout operator terminal.

use super::{NoticeLevel, Operator};
use crate::render::Palette;
use std::io::{self, BufRead, Write};

/// Line-oriented input.
pub trait LineInput {
    /// One line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads lines from the process's stdin without holding its lock, so the
/// prompt chooser and the operator can share it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinLines;

impl LineInput for StdinLines {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(buf)))
    }
}

/// Adapts any `BufRead`.
#[derive(Debug)]
pub struct BufLines<R>(pub R);

impl<R: BufRead> LineInput for BufLines<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        if self.0.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(buf)))
    }
}

fn strip_newline(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug)]
pub struct TerminalOperator<I, W> {
    input: I,
    output: W,
    palette: Palette,
    clear: bool,
}

impl TerminalOperator<StdinLines, io::Stdout> {
    /// Operator on the process's stdin/stdout. The screen is cleared
    /// between cycles only when `clear` is set.
    pub fn stdio(palette: Palette, clear: bool) -> Self {
        Self::new(StdinLines, io::stdout(), palette, clear)
    }
}

impl<I: LineInput, W: Write> TerminalOperator<I, W> {
    pub fn new(input: I, output: W, palette: Palette, clear: bool) -> Self {
        Self {
            input,
            output,
            palette,
            clear,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<I: LineInput, W: Write> Operator for TerminalOperator<I, W> {
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", self.palette.info(message))?;
        self.output.flush()?;
        self.input.next_line()
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        let text = match level {
            NoticeLevel::Info => self.palette.info(message),
            NoticeLevel::Success => self.palette.success(message),
            NoticeLevel::Warning => self.palette.metric(message),
            NoticeLevel::Error => self.palette.failure(message),
        };
        // a closed stdout leaves nothing to report to
        let _ = writeln!(self.output, "{text}");
        let _ = self.output.flush();
    }

    fn display(&mut self, screen: &str) {
        if self.clear {
            let _ = write!(self.output, "{CLEAR_SCREEN}");
        }
        let _ = writeln!(self.output, "{screen}");
        let _ = self.output.flush();
    }

    fn show(&mut self, text: &str) {
        let _ = writeln!(self.output, "{text}");
        let _ = self.output.flush();
    }

    fn palette(&self) -> Palette {
        self.palette
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn operator(input: &str) -> TerminalOperator<BufLines<Cursor<Vec<u8>>>, Vec<u8>> {
        TerminalOperator::new(
            BufLines(Cursor::new(input.as_bytes().to_vec())),
            Vec::new(),
            Palette::plain(),
            false,
        )
    }

    #[test]
    fn test_prompt_reads_lines_then_eof() {
        let mut op = operator("y\r\nsecond\n");
        assert_eq!(op.prompt("kill? ").unwrap(), Some("y".to_string()));
        assert_eq!(op.prompt("again? ").unwrap(), Some("second".to_string()));
        assert_eq!(op.prompt("more? ").unwrap(), None);
        let out = String::from_utf8(op.into_output()).unwrap();
        assert_eq!(out, "kill? again? more? ");
    }

    #[test]
    fn test_notify_and_display_plain() {
        let mut op = operator("");
        op.display("=== Process Manager ===");
        op.notify(NoticeLevel::Success, "Process 5 terminated.");
        let out = String::from_utf8(op.into_output()).unwrap();
        assert_eq!(out, "=== Process Manager ===\nProcess 5 terminated.\n");
    }

    #[test]
    fn test_color_and_clear() {
        let mut op = TerminalOperator::new(
            BufLines(Cursor::new(Vec::new())),
            Vec::new(),
            Palette::new(true),
            true,
        );
        op.display("x");
        op.notify(NoticeLevel::Error, "denied");
        let out = String::from_utf8(op.into_output()).unwrap();
        assert!(out.starts_with(CLEAR_SCREEN));
        assert!(out.contains("\x1b[31mdenied\x1b[0m"));
    }
}
