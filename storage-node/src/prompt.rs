//! Line-oriented menu prompts.
//!
//! Menus are shown 1-based and selections come back 0-based. These helpers
//! use blocking I/O: an interactive stdin read cannot be cancelled, so they
//! are meant to run on a thread dedicated to user input.

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::debug;

use crate::answer::{AnswerError, AnswerSender};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("{selection} is not between 1 and {options}")]
    OutOfRange { selection: i64, options: usize },
}

/// Parses a 1-based menu selection into a 0-based index.
pub fn parse_selection(input: &str, option_count: usize) -> Result<i32, SelectionError> {
    let trimmed = input.trim();
    let selection: i64 = trimmed
        .parse()
        .map_err(|_| SelectionError::NotANumber(trimmed.to_string()))?;

    let out_of_range = SelectionError::OutOfRange {
        selection,
        options: option_count,
    };
    let in_range = usize::try_from(selection).is_ok_and(|n| (1..=option_count).contains(&n));
    if !in_range {
        return Err(out_of_range);
    }
    i32::try_from(selection - 1).map_err(|_| out_of_range)
}

pub fn render_menu<W, S>(writer: &mut W, expected: &[S], operation: &str) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    writeln!(writer)?;
    writeln!(writer, "Select one of the {operation}:")?;
    for (num, option) in expected.iter().enumerate() {
        writeln!(writer, "{}) {}", num + 1, option.as_ref())?;
    }
    writer.flush()
}

pub fn read_command<R, W, S>(reader: &mut R, writer: &mut W, expected: &[S]) -> io::Result<i32>
where
    R: BufRead,
    W: Write,
    S: AsRef<str>,
{
    read_selection(reader, writer, expected, "commands")
}

/// Shows the menu and reads lines until one is a valid selection.
///
/// End of input is reported as [`io::ErrorKind::UnexpectedEof`].
pub fn read_selection<R, W, S>(
    reader: &mut R,
    writer: &mut W,
    expected: &[S],
    operation: &str,
) -> io::Result<i32>
where
    R: BufRead,
    W: Write,
    S: AsRef<str>,
{
    let mut line = String::new();
    loop {
        render_menu(writer, expected, operation)?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before a selection was made",
            ));
        }

        match parse_selection(&line, expected.len()) {
            Ok(selection) => return Ok(selection),
            Err(err) => writeln!(writer, "Please select a valid option: {err}")?,
        }
    }
}

/// Forwards the first valid selection read from `reader` to `sender`.
///
/// Returns once an answer was delivered, the round was abandoned, or the
/// input ended.
pub fn feed_answers<R, W>(
    reader: &mut R,
    writer: &mut W,
    option_count: usize,
    sender: &AnswerSender,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    while !sender.is_abandoned() {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            debug!("answer input closed");
            return Ok(());
        }

        let selection = match parse_selection(&line, option_count) {
            Ok(selection) => selection,
            Err(err) => {
                writeln!(writer, "Please select a valid option: {err}")?;
                writer.flush()?;
                continue;
            }
        };

        match sender.answer(selection) {
            Ok(()) => return Ok(()),
            Err(AnswerError::Abandoned) => {
                debug!(selection, "answer arrived after the round ended");
                return Ok(());
            }
            Err(AnswerError::AlreadyAnswered) => return Ok(()),
        }
    }
    Ok(())
}

/// Blocks until a line is entered. `false` means input closed or failed.
pub fn read_enter<R: BufRead>(reader: &mut R) -> bool {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => false,
        Ok(_) => true,
        Err(err) => {
            debug!(error = ?err, "unable to read input");
            false
        }
    }
}
