//! Byte offset to line/column mapping

use serde::{Deserialize, Serialize};

/// 1-based line/column position in a source text
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
}

impl Position {
    /// Create position
    #[inline]
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Precomputed line starts for fast offset lookups
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Index the given text
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    /// Position of a byte offset
    ///
    /// Offsets past the end clamp to the last position.
    #[must_use]
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line_idx];
        let column = self
            .text
            .get(start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        Position::new(to_u32(line_idx + 1), to_u32(column + 1))
    }

    /// Text of a 1-based line, without its terminator
    #[must_use]
    pub fn line_text(&self, line: u32) -> Option<&'a str> {
        let idx = usize::try_from(line).ok()?.checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.text.len(), |next| next - 1);
        self.text
            .get(start..end)
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
    }

    /// Number of lines
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_offset_is_one_one() {
        let index = LineIndex::new("abc");
        assert_eq!(index.position(0), Position::new(1, 1));
        assert_eq!(index.position(2), Position::new(1, 3));
    }

    #[test]
    fn positions_after_newlines() {
        let text = "a\nbc\n\ndef";
        let index = LineIndex::new(text);
        assert_eq!(index.position(2), Position::new(2, 1));
        assert_eq!(index.position(3), Position::new(2, 2));
        assert_eq!(index.position(5), Position::new(3, 1));
        assert_eq!(index.position(8), Position::new(4, 3));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn offset_past_end_clamps() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.position(100), Position::new(2, 3));
    }

    #[test]
    fn columns_count_chars() {
        let index = LineIndex::new("é = eval(1)");
        let offset = "é = ".len();
        assert_eq!(index.position(offset), Position::new(1, 5));
    }

    #[test]
    fn line_text_lookup() {
        let index = LineIndex::new("one\r\ntwo\nthree");
        assert_eq!(index.line_text(1), Some("one"));
        assert_eq!(index.line_text(2), Some("two"));
        assert_eq!(index.line_text(3), Some("three"));
        assert_eq!(index.line_text(0), None);
        assert_eq!(index.line_text(4), None);
    }
}
