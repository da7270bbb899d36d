//! Error reporting for spell parsing and persistence
//!
//! Syntax errors always carry the 1-based line/column of the offending
//! construct plus a [`SyntaxErrorKind`] so callers can react to the failure
//! class without matching on message text.
//!
//! # Example Output
//!
//! ```text
//! Error at line 2, column 7: missing operator between spells
//! #sage #op
//!       ^
//! ```

use super::source_location::{get_line_at_offset, SourcePosition};
use std::fmt;

/// What went wrong while parsing spell source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    /// Two operands follow each other without `&` or `|`
    MissingOperator,
    /// `#name` does not name a known spell
    UnknownSpell,
    /// The spell requires an argument and none was given
    MissingArgument,
    /// The spell takes no argument but one was given
    UnexpectedArgument,
    /// The argument does not have the shape the spell expects
    InvalidArgument,
    /// Malformed `[board,thread]` scope
    InvalidScope,
    /// A `(` without its `)` or a stray `)`
    UnbalancedParenthesis,
    /// Malformed `/regex/flags` literal or a regex that does not compile
    InvalidRegex,
    /// A replacement declaration where `&` or `|` was expected
    ReplacementWhereOperatorExpected,
    /// A replacement declaration after `&`, `|` or `!`
    ReplacementInExpression,
    /// A replacement declaration inside parentheses
    ReplacementInGroup,
    /// `&` or `|` following a replacement declaration
    OperatorAfterReplacement,
    /// Any other unexpected character
    UnexpectedToken,
    /// Input ended in the middle of a construct
    UnexpectedEnd,
    /// Input size or nesting depth exceeds the parser limits
    LimitExceeded,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingOperator => "missing operator",
            Self::UnknownSpell => "unknown spell",
            Self::MissingArgument => "missing argument",
            Self::UnexpectedArgument => "unexpected argument",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidScope => "invalid scope",
            Self::UnbalancedParenthesis => "unbalanced parenthesis",
            Self::InvalidRegex => "invalid regular expression",
            Self::ReplacementWhereOperatorExpected => "replacement where operator expected",
            Self::ReplacementInExpression => "replacement inside expression",
            Self::ReplacementInGroup => "replacement inside group",
            Self::OperatorAfterReplacement => "operator after replacement",
            Self::UnexpectedToken => "unexpected token",
            Self::UnexpectedEnd => "unexpected end of input",
            Self::LimitExceeded => "limit exceeded",
        };
        f.write_str(text)
    }
}

/// A syntax error with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Failure class
    pub kind: SyntaxErrorKind,
    /// Human-readable message
    pub message: String,
    /// Where the error occurred
    pub position: SourcePosition,
}

impl SyntaxError {
    /// Create an error at a byte offset of `source`
    pub fn at(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        source: &str,
        offset: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            position: SourcePosition::from_offset(source, offset),
        }
    }

    /// Line number (1-based)
    #[inline]
    pub fn line(&self) -> usize {
        self.position.line
    }

    /// Column number (1-based)
    #[inline]
    pub fn column(&self) -> usize {
        self.position.column
    }

    /// Format with the offending source line and a caret under the column
    pub fn format_with_source(&self, source: &str) -> String {
        let mut output = format!("{}\n", self);
        output.push_str(get_line_at_offset(source, self.position.offset));
        output.push('\n');
        for _ in 0..self.position.column.saturating_sub(1) {
            output.push(' ');
        }
        output.push('^');
        output
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at line {}, column {}: {}",
            self.position.line, self.position.column, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Error loading a persisted ruleset
#[derive(Debug)]
pub enum PersistError {
    /// The JSON document is malformed or does not match the schema
    Json(serde_json::Error),
    /// The document was compiled from other rules
    FingerprintMismatch {
        /// Fingerprint found in the document
        stored: u64,
        /// Fingerprint of the current rules
        computed: u64,
    },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Json(e) => write!(f, "Invalid persisted ruleset: {}", e),
            PersistError::FingerprintMismatch { stored, computed } => write!(
                f,
                "Fingerprint mismatch: stored {:016x}, computed {:016x}",
                stored, computed
            ),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Json(e) => Some(e),
            PersistError::FingerprintMismatch { .. } => None,
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_position() {
        let source = "#sage\n#op #all";
        let error = SyntaxError::at(
            SyntaxErrorKind::MissingOperator,
            "missing operator between spells",
            source,
            10,
        );
        assert_eq!(error.line(), 2);
        assert_eq!(error.column(), 5);
    }

    #[test]
    fn test_format_with_source() {
        let source = "#sage\n#op #all";
        let error = SyntaxError::at(SyntaxErrorKind::MissingOperator, "missing operator", source, 10);

        let formatted = error.format_with_source(source);
        assert!(formatted.contains("line 2, column 5"));
        assert!(formatted.ends_with("#op #all\n    ^"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SyntaxErrorKind::UnknownSpell.to_string(), "unknown spell");
        assert_eq!(
            SyntaxErrorKind::UnbalancedParenthesis.to_string(),
            "unbalanced parenthesis"
        );
    }
}
