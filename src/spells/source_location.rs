//! Source Location Utilities
//!
//! Line/column bookkeeping for spell source text. The parser works on byte
//! offsets and only converts to 1-based line/column when it reports an error.

use memchr::{memchr_iter, memrchr};
use std::fmt;

/// A position in spell source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in characters)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Create a position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Calculate position from a byte offset in the input
    ///
    /// Offsets past the end are clamped; offsets inside a multi-byte
    /// character are moved back to the character boundary.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let mut offset = offset.min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }

        let before = &input.as_bytes()[..offset];
        let line = memchr_iter(b'\n', before).count() + 1;
        let line_start = memrchr(b'\n', before).map(|n| n + 1).unwrap_or(0);
        let column = input[line_start..offset].chars().count() + 1;

        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}

/// Get the line content at a given offset, without its line terminator
pub fn get_line_at_offset(input: &str, offset: usize) -> &str {
    let pos = SourcePosition::from_offset(input, offset);
    let bytes = input.as_bytes();

    let line_start = memrchr(b'\n', &bytes[..pos.offset])
        .map(|n| n + 1)
        .unwrap_or(0);
    let line_end = memchr::memchr(b'\n', &bytes[pos.offset..])
        .map(|n| pos.offset + n)
        .unwrap_or(input.len());

    input[line_start..line_end].trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_position_start() {
        let pos = SourcePosition::start();
        assert_eq!(pos.offset, 0);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 1);
    }

    #[test]
    fn test_from_offset_multiline() {
        let input = "#sage\n#op & #all";
        let pos = SourcePosition::from_offset(input, 11);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 6);
    }

    #[test]
    fn test_from_offset_counts_characters() {
        let input = "#words(привет) #op";
        let offset = input.find("#op").unwrap();
        let pos = SourcePosition::from_offset(input, offset);
        assert_eq!((pos.line, pos.column), (1, 16));
    }

    #[test]
    fn test_from_offset_clamps() {
        let pos = SourcePosition::from_offset("ab", 100);
        assert_eq!(pos.offset, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_get_line_at_offset() {
        let input = "#sage\r\n#op | #all\n#num(1)";
        assert_eq!(get_line_at_offset(input, 9), "#op | #all");
        assert_eq!(get_line_at_offset(input, 0), "#sage");
        assert_eq!(get_line_at_offset(input, input.len()), "#num(1)");
    }
}
