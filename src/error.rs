//! Error types and Result aliases for astdump

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias for parsing and serialization
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while tokenizing, parsing or serializing SQL
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Input text that does not form a valid token
    #[error("unrecognized token: \"{token}\" at line {line}, column {column}")]
    UnrecognizedToken {
        token: String,
        line: u32,
        column: u32,
    },

    /// A valid token in a position the grammar does not allow
    #[error("near \"{near}\": syntax error at line {line}, column {column}")]
    Syntax { near: String, line: u32, column: u32 },

    /// A grammatically valid construct that is still rejected
    #[error("{message} at line {line}, column {column}")]
    Invalid {
        message: String,
        line: u32,
        column: u32,
    },

    /// Input ended in the middle of a statement
    #[error("incomplete input")]
    Incomplete,

    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    /// Source line the error points at, if any
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::UnrecognizedToken { line, .. }
            | Error::Syntax { line, .. }
            | Error::Invalid { line, .. } => Some(*line),
            Error::Incomplete | Error::OutOfMemory(_) => None,
        }
    }
}

/// Failure of a whole dump request
#[derive(Error, Debug)]
pub enum DumpError {
    /// The parser failed before any SELECT was captured
    #[error("Parse error: {0}")]
    Parse(#[source] Error),

    /// The input parsed but contained no root-level SELECT
    #[error("No SELECT statement found in input")]
    NoSelect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_message() {
        let err = Error::Syntax {
            near: "FROM".to_string(),
            line: 1,
            column: 8,
        };
        assert_eq!(
            err.to_string(),
            "near \"FROM\": syntax error at line 1, column 8"
        );
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_dump_error_messages() {
        let err = DumpError::Parse(Error::Incomplete);
        assert_eq!(err.to_string(), "Parse error: incomplete input");
        assert_eq!(
            DumpError::NoSelect.to_string(),
            "No SELECT statement found in input"
        );
    }
}
