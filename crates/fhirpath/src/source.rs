//! Source positions and the line/column ↔ byte-offset map.
//!
//! Everything downstream (tokens, AST nodes, diagnostics) locates itself in
//! source text through a [`Position`]; the [`SourceMap`] is the only place
//! that knows how to turn a byte offset into `{ line, column }` or back.

pub use fhirpath_support::Position;

/// A span of source text, `start..end`, both inclusive-exclusive in the
/// usual half-open sense (`end` is one past the last covered position).
/// Satisfies `start <= end` (§3 Invariants) by construction: every
/// constructor here takes `end` as `start` plus a non-negative advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(end.offset >= start.offset, "range end must not precede start");
        Range { start, end }
    }
}

/// Precomputes line-start offsets so that offset → `{ line, column }` is a
/// binary search rather than a rescan of the source (§4.1).
///
/// `\n` is the only line terminator recognized for splitting; a preceding
/// `\r` is counted in the byte offset but, because it always falls exactly
/// at "one past the last real column" of its line, never contributes an
/// extra column of its own.
pub struct SourceMap {
    line_starts: Vec<usize>,
    len: usize,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap { line_starts, len: source.len() }
    }

    /// Total number of lines in the source (always ≥ 1).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a byte offset to a position. Offsets past the end of the
    /// source clamp to the final line, per §4.1.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insertion) => insertion - 1,
        };
        let column = offset - self.line_starts[line];
        Position { line, column, offset }
    }

    /// Converts a `{ line, column }` pair back to a byte offset, or `None`
    /// if `line` is out of range.
    pub fn position_to_offset(&self, line: usize, column: usize) -> Option<usize> {
        let start = *self.line_starts.get(line)?;
        Some(start + column)
    }

    /// The raw text covered by `range`.
    pub fn range_text<'a>(&self, source: &'a str, range: Range) -> &'a str {
        &source[range.start.offset..range.end.offset]
    }

    /// The text of a single line, with any trailing `\r`/`\n` stripped.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        let start = match self.line_starts.get(line) {
            Some(&s) => s,
            None => return "",
        };
        let end = self.line_starts.get(line + 1).copied().unwrap_or(self.len);
        source[start..end].trim_end_matches(['\n', '\r'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_offsets() {
        let map = SourceMap::new("Patient.name");
        let pos = map.offset_to_position(8);
        assert_eq!(pos, Position { line: 0, column: 8, offset: 8 });
    }

    #[test]
    fn multi_line_offsets() {
        let src = "Patient\n.name\n.given";
        let map = SourceMap::new(src);
        // '.' of ".name" is at offset 8, start of line 1.
        assert_eq!(map.offset_to_position(8), Position { line: 1, column: 0, offset: 8 });
        assert_eq!(map.position_to_offset(1, 0), Some(8));
        assert_eq!(map.line_text(src, 1), ".name");
    }

    #[test]
    fn crlf_offsets_dont_double_count() {
        let src = "a\r\nb";
        let map = SourceMap::new(src);
        // line 1 ("b") starts right after the '\n' at offset 3.
        assert_eq!(map.offset_to_position(3), Position { line: 1, column: 0, offset: 3 });
    }

    #[test]
    fn out_of_range_offset_clamps_to_final_line() {
        let src = "a\nbb";
        let map = SourceMap::new(src);
        let pos = map.offset_to_position(100);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.offset, src.len());
    }
}
