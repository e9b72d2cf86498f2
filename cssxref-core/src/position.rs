//! Line index for offset ↔ line/column conversion.
//!
//! The index stores the byte offset of the start of each line, enabling
//! O(log n) lookups in both directions. Columns are byte columns; the LSP
//! layer converts them to UTF-16 units when it needs to.

use crate::error::{XrefError, XrefResult};

/// A line and column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    #[inline]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Precomputed line starts for one text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// `line_starts[i]` is the offset where line `i` begins.
    line_starts: Vec<usize>,
    len: usize,
    /// 0 for editor-style positions, 1 for human-readable ones.
    origin: u32,
}

impl LineIndex {
    /// Builds a 0-based index.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );

        Self {
            line_starts,
            len: text.len(),
            origin: 0,
        }
    }

    /// Builds an index whose lines and columns start at `origin` (0 or 1).
    pub fn with_origin(text: &str, origin: u32) -> XrefResult<Self> {
        if origin > 1 {
            return Err(XrefError::invalid_argument(format!(
                "line index origin must be 0 or 1, got {}",
                origin
            )));
        }
        let mut index = Self::new(text);
        index.origin = origin;
        Ok(index)
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    #[inline]
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Byte offset where `line` (in this index's origin) starts.
    pub fn line_start(&self, line: u32) -> Option<usize> {
        let idx = line.checked_sub(self.origin)? as usize;
        self.line_starts.get(idx).copied()
    }

    /// Converts a byte offset to a line/column position.
    ///
    /// Returns `None` if the offset is at or past the end of the text.
    pub fn offset_to_line_col(&self, offset: usize) -> Option<LineCol> {
        if offset >= self.len {
            return None;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };

        Some(LineCol {
            line: line as u32 + self.origin,
            col: (offset - self.line_starts[line]) as u32 + self.origin,
        })
    }

    /// Converts a line/column position back to a byte offset.
    ///
    /// Returns `None` if the position lies outside the text or past the end
    /// of its line.
    pub fn line_col_to_offset(&self, line: u32, col: u32) -> Option<usize> {
        let line_idx = line.checked_sub(self.origin)? as usize;
        let col = col.checked_sub(self.origin)? as usize;
        let start = *self.line_starts.get(line_idx)?;
        let next = self
            .line_starts
            .get(line_idx + 1)
            .copied()
            .unwrap_or(self.len);

        let offset = start + col;
        (offset < next).then_some(offset)
    }
}

/// Builds a 0-based line index for `text`.
pub fn build_index(text: &str) -> LineIndex {
    LineIndex::new(text)
}

/// Maps `offset` through `index`.
pub fn offset_to_line_col(index: &LineIndex, offset: usize) -> Option<LineCol> {
    index.offset_to_line_col(offset)
}
