//! CLI utilities for the interactive client.
//!
//! The utilities present in this module drive a prompt loop that sends each
//! entered line to a server as one statement and prints the decoded response.
use std::{
    fmt::Write as _,
    io::{self, BufRead, Write},
};

use thiserror::Error;

use crate::protocol::Response;

pub const HELP: &str = "\
Enter one SQL statement per line; it is sent to the server as-is.
  .help    show this message
  .exit    close the connection and quit";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unrecognized command '{0}'")]
    Unrecognized(String),

    #[error("terminal IO error: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`
    Exit,
    /// Usage command `.help`
    Help,
    /// Statement to send to the server
    Statement(String),
}

impl TryFrom<&str> for Command {
    type Error = CliError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        match line.trim() {
            ".exit" => Ok(Command::Exit),
            ".help" => Ok(Command::Help),
            s if s.starts_with('.') => Err(CliError::Unrecognized(s.to_string())),
            s => Ok(Command::Statement(s.to_string())),
        }
    }
}

/// Prompt user for the next command.
///
/// Returns `Ok(None)` once the input is exhausted.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Option<Command>, CliError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(None);
    }

    Command::try_from(s.as_str()).map(Some)
}

/// Human-readable rendering of a server response.
pub fn render(resp: &Response) -> String {
    match resp {
        Response::Affected(n) => format!("{n} rows affected"),
        Response::Error(message) => format!("error: {message}"),
        Response::Rows(rows) => {
            let mut out = String::new();
            for row in rows {
                let line = row
                    .fields()
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(" | ");
                let _ = writeln!(out, "{line}");
            }
            let _ = write!(out, "({} rows)", rows.len());
            out
        }
    }
}
