use crate::domain::command::LoanCommand;
use crate::error::{LoanError, Result};
use std::io::{BufRead, BufReader, Read};

/// Reads loan commands from a JSON-lines source, one command object per line.
///
/// Blank lines are skipped. A malformed line yields an error for that line
/// only; reading continues with the next one.
pub struct CommandReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<LoanCommand>> {
        self.reader
            .lines()
            .filter(|line| !matches!(line, Ok(text) if text.trim().is_empty()))
            .map(|line| {
                let line = line.map_err(LoanError::from)?;
                serde_json::from_str(line.trim()).map_err(LoanError::from)
            })
    }
}
