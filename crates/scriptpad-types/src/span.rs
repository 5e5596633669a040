//! Styled span types for syntax highlighting.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Style class of a highlighted span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanClass {
    /// Unstyled text.
    Plain,
    /// Reserved word.
    Keyword,
    /// String literal, including its delimiters.
    String,
    /// Line or block comment, including its markers.
    Comment,
}

/// A half-open `[start, end)` byte range of the document carrying one
/// style class.
///
/// A full highlight pass returns spans that are sorted, non-empty,
/// non-overlapping, and together cover the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledSpan {
    /// Byte offset of the first styled byte.
    pub start: usize,
    /// Byte offset one past the last styled byte.
    pub end: usize,
    /// Style class to render the range with.
    pub class: SpanClass,
}

impl StyledSpan {
    pub fn new(start: usize, end: usize, class: SpanClass) -> Self {
        Self { start, end, class }
    }

    /// The span as a byte range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}
