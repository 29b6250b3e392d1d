//! Wire encoding of store results.
//!
//! Every response is a single line of text in one of three shapes:
//!
//! - `SUCCESS: {n} rows affected` for a write statement,
//! - `SUCCESS|{row}|{row}|...` for a read statement, where each row is its
//!   fields joined by `,` and a `NULL` field is rendered as empty text,
//! - `ERROR: {message}` for any failure.
//!
//! Field values are written as-is. A value that itself contains `,` or `|`
//! cannot be told apart from a delimiter by the reader; likewise `NULL` and the
//! empty string decode identically, and a single row holding one empty field
//! decodes as an empty result. These are properties of the wire format.
//!
//! The frame sentinel is the one byte a payload may never carry, so a zero
//! byte inside a field or error message is written as U+FFFD instead.
use std::fmt;

use thiserror::Error;

use crate::store::{CommandResult, Field, QueryResult, Row};

const SUCCESS_ROWS: &str = "SUCCESS|";
const SUCCESS_AFFECTED: &str = "SUCCESS: ";
const AFFECTED_SUFFIX: &str = " rows affected";
const ERROR_PREFIX: &str = "ERROR: ";

const ROW_SEPARATOR: char = '|';
const FIELD_SEPARATOR: char = ',';
const NUL: char = '\0';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("malformed response '{0}'")]
    Malformed(String),

    #[error("invalid affected row count in '{0}'")]
    AffectedCount(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Write statement succeeded.
    Affected(usize),
    /// Read statement succeeded.
    Rows(Vec<Row>),
    Error(String),
}

impl Response {
    /// Build an error response, flattening the message onto one line.
    pub fn error(message: impl fmt::Display) -> Self {
        let message = message
            .to_string()
            .chars()
            .map(|c| match c {
                '\n' | '\r' => ' ',
                NUL => char::REPLACEMENT_CHARACTER,
                c => c,
            })
            .collect();
        Response::Error(message)
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Error(_))
    }

    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Response::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Response::Affected(n) => format!("{SUCCESS_AFFECTED}{n}{AFFECTED_SUFFIX}"),
            Response::Rows(rows) => {
                let mut out = String::from(SUCCESS_ROWS);
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        out.push(ROW_SEPARATOR);
                    }
                    encode_row(&mut out, row);
                }
                out
            }
            Response::Error(message) => format!("{ERROR_PREFIX}{message}"),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ResponseError> {
        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return Ok(Response::Error(message.to_string()));
        }

        if let Some(payload) = line.strip_prefix(SUCCESS_ROWS) {
            if payload.is_empty() {
                return Ok(Response::Rows(Vec::new()));
            }

            let rows = payload
                .split(ROW_SEPARATOR)
                .map(|row| Row::new(row.split(FIELD_SEPARATOR).map(Field::text).collect()))
                .collect();
            return Ok(Response::Rows(rows));
        }

        if let Some(rest) = line.strip_prefix(SUCCESS_AFFECTED) {
            let count = rest
                .strip_suffix(AFFECTED_SUFFIX)
                .ok_or_else(|| ResponseError::Malformed(line.to_string()))?;
            return count
                .parse()
                .map(Response::Affected)
                .map_err(|_| ResponseError::AffectedCount(line.to_string()));
        }

        Err(ResponseError::Malformed(line.to_string()))
    }
}

fn encode_row(out: &mut String, row: &Row) {
    for (i, field) in row.fields().iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.extend(field.as_str().chars().map(|c| {
            if c == NUL {
                char::REPLACEMENT_CHARACTER
            } else {
                c
            }
        }));
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<CommandResult> for Response {
    fn from(value: CommandResult) -> Self {
        match value {
            Ok(affected) => Response::Affected(affected),
            Err(e) => Response::error(e),
        }
    }
}

impl From<QueryResult> for Response {
    fn from(value: QueryResult) -> Self {
        match value {
            Ok(rows) => Response::Rows(rows),
            Err(e) => Response::error(e),
        }
    }
}
