//! Built-in chooser for terminals without fzf.

use super::terminal::{LineInput, StdinLines};
use super::{Chooser, ChooserError};
use crate::render::{parse_pid_from_line, Palette};
use pm_common::ProcessId;
use std::io::{self, Write};

pub const CHOOSE_PROMPT: &str = "Enter a PID to select (empty to skip): ";

/// Asks for a pid from the list already on screen.
///
/// An empty answer, end of input, or a pid that is not listed counts as
/// nothing chosen.
#[derive(Debug)]
pub struct PromptChooser<I, W> {
    input: I,
    output: W,
    palette: Palette,
}

impl PromptChooser<StdinLines, io::Stdout> {
    pub fn stdio(palette: Palette) -> Self {
        Self::new(StdinLines, io::stdout(), palette)
    }
}

impl<I: LineInput, W: Write> PromptChooser<I, W> {
    pub fn new(input: I, output: W, palette: Palette) -> Self {
        Self {
            input,
            output,
            palette,
        }
    }
}

impl<I: LineInput, W: Write> Chooser for PromptChooser<I, W> {
    fn choose(&mut self, lines: &[String]) -> Result<Option<String>, ChooserError> {
        write!(self.output, "{}", self.palette.info(CHOOSE_PROMPT))?;
        self.output.flush()?;

        let Some(answer) = self.input.next_line()? else {
            return Ok(None);
        };
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        let Ok(pid) = answer.parse::<ProcessId>() else {
            writeln!(self.output, "{}", self.palette.failure(&format!("Not a PID: {answer}")))?;
            return Ok(None);
        };

        let chosen = lines
            .iter()
            .find(|line| parse_pid_from_line(line) == Some(pid))
            .cloned();
        if chosen.is_none() {
            writeln!(
                self.output,
                "{}",
                self.palette.failure(&format!("PID {pid} is not in the list."))
            )?;
        }
        Ok(chosen)
    }

    fn name(&self) -> &str {
        "prompt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::terminal::BufLines;
    use std::io::Cursor;

    fn chooser(input: &str) -> PromptChooser<BufLines<Cursor<Vec<u8>>>, Vec<u8>> {
        PromptChooser::new(
            BufLines(Cursor::new(input.as_bytes().to_vec())),
            Vec::new(),
            Palette::plain(),
        )
    }

    fn lines() -> Vec<String> {
        vec!["1        | init".to_string(), "50       | chrome".to_string()]
    }

    #[test]
    fn test_picks_listed_pid() {
        let mut c = chooser("50\n");
        assert_eq!(c.choose(&lines()).unwrap(), Some("50       | chrome".to_string()));
    }

    #[test]
    fn test_empty_answer_and_eof_decline() {
        assert_eq!(chooser("\n").choose(&lines()).unwrap(), None);
        assert_eq!(chooser("").choose(&lines()).unwrap(), None);
    }

    #[test]
    fn test_unlisted_or_bad_pid_declines_with_message() {
        let mut c = chooser("99\n");
        assert_eq!(c.choose(&lines()).unwrap(), None);
        let out = String::from_utf8(c.output).unwrap();
        assert!(out.contains("PID 99 is not in the list."));

        let mut c = chooser("abc\n");
        assert_eq!(c.choose(&lines()).unwrap(), None);
        assert!(String::from_utf8(c.output).unwrap().contains("Not a PID: abc"));
    }
}
