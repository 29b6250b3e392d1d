//! Statement classification.
//!
//! Every message received from a client is treated as a single SQL statement.
//! Before it reaches the store it is trimmed and tagged with a [`StatementKind`],
//! which decides whether the store should run it through its read path
//! ([`StatementKind::Query`]) or its write path ([`StatementKind::Command`]).
//!
//! Classification is deliberately shallow: only a case-insensitive `SELECT`
//! prefix makes a statement a query. Everything else, including empty or
//! malformed text, is a command and the store reports its own failure.
use std::fmt;

const QUERY_PREFIX: &[u8] = b"SELECT";

/// Store path a statement is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Command,
}

/// Trimmed statement text together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    text: String,
    kind: StatementKind,
}

impl Statement {
    pub fn new(raw: &str) -> Self {
        let text = raw.trim().to_string();
        let kind = classify(&text);
        Self { text, kind }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}

impl From<&str> for Statement {
    fn from(value: &str) -> Self {
        Statement::new(value)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Query => write!(f, "query"),
            StatementKind::Command => write!(f, "command"),
        }
    }
}

/// Classify already-trimmed statement text.
pub fn classify(text: &str) -> StatementKind {
    let bytes = text.as_bytes();
    if bytes.len() >= QUERY_PREFIX.len()
        && bytes[..QUERY_PREFIX.len()].eq_ignore_ascii_case(QUERY_PREFIX)
    {
        StatementKind::Query
    } else {
        StatementKind::Command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_query_case_insensitive() {
        for text in ["SELECT 1", "select * from users", "SeLeCt name FROM t"] {
            assert_eq!(classify(text), StatementKind::Query, "{text}");
        }
    }

    #[test]
    fn other_statements_are_commands() {
        let inputs = vec![
            "INSERT INTO users VALUES ('a', 'b')",
            "CREATE TABLE t (x)",
            "UPDATE t SET x = 1",
            "SELEKT 1",
            "SELEC",
        ];

        for text in inputs {
            assert_eq!(classify(text), StatementKind::Command, "{text}");
        }
    }

    #[test]
    fn empty_statement_is_command() {
        let statement = Statement::new("");

        assert_eq!(statement.kind(), StatementKind::Command);
        assert_eq!(statement.text(), "");
    }

    #[test]
    fn statement_is_trimmed_before_classification() {
        let statement: Statement = "  \n\tselect 1 \r\n".into();

        assert_eq!(statement.kind(), StatementKind::Query);
        assert_eq!(statement.text(), "select 1");
    }

    #[test]
    fn multibyte_prefix_does_not_panic() {
        assert_eq!(classify("séléct 1"), StatementKind::Command);
        assert_eq!(classify("ñ"), StatementKind::Command);
    }
}
