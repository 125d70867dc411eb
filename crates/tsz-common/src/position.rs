//! Position and line map utilities.
//!
//! The oracle reports diagnostics as byte offsets; the loader reports them as
//! 0-based line/character pairs. This module converts between the two.

use serde::{Deserialize, Serialize};

/// A position in a source file (0-indexed line and column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed column (UTF-16 code units, matching the compiler)
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

/// Line map for offset -> position conversion.
/// Stores the starting offset of each line.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Starting offset of each line (line_starts[0] is always 0)
    line_starts: Vec<u32>,
}

impl LineMap {
    /// Build a line map from source text.
    pub fn build(source: &str) -> Self {
        let mut line_starts = vec![0u32];

        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push((i + 1) as u32);
            } else if ch == '\r' {
                // \r\n is handled by the \n; a lone \r ends the line itself
                let next_idx = i + 1;
                if source.as_bytes().get(next_idx) != Some(&b'\n') {
                    line_starts.push(next_idx as u32);
                }
            }
        }

        LineMap { line_starts }
    }

    /// Convert a byte offset to a Position (line, character).
    pub fn offset_to_position(&self, offset: u32, source: &str) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_point) => insert_point.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let clamped_end = (offset as usize).min(source.len());
        let start = (line_start as usize).min(clamped_end);
        let slice = source.get(start..clamped_end).unwrap_or("");
        let character = slice.chars().map(|ch| ch.len_utf16() as u32).sum();

        Position {
            line: line as u32,
            character,
        }
    }

    /// Get the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the starting offset of a line.
    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.line_starts.get(line).copied()
    }
}

#[cfg(test)]
mod position_tests {
    use super::*;

    #[test]
    fn test_line_map_simple() {
        let source = "line1\nline2\nline3";
        let map = LineMap::build(source);

        assert_eq!(map.line_count(), 3);
        assert_eq!(map.offset_to_position(0, source), Position::new(0, 0));
        assert_eq!(map.offset_to_position(4, source), Position::new(0, 4));
        assert_eq!(map.offset_to_position(6, source), Position::new(1, 0));
        assert_eq!(map.offset_to_position(12, source), Position::new(2, 0));
    }

    #[test]
    fn test_line_map_windows_line_endings() {
        let source = "line1\r\nline2\r\nline3";
        let map = LineMap::build(source);

        assert_eq!(map.line_count(), 3);
        assert_eq!(map.offset_to_position(7, source), Position::new(1, 0));
        assert_eq!(map.line_start(2), Some(14));
    }

    #[test]
    fn test_offset_past_end_clamps() {
        let source = "ab\ncd";
        let map = LineMap::build(source);
        assert_eq!(map.offset_to_position(99, source), Position::new(1, 2));
    }

    #[test]
    fn test_character_counts_utf16_units() {
        let source = "const s = '😀'; x";
        let map = LineMap::build(source);
        let offset = source.find('x').unwrap() as u32;
        // The emoji is 4 bytes but 2 UTF-16 code units.
        assert_eq!(map.offset_to_position(offset, source), Position::new(0, 16));
    }
}
