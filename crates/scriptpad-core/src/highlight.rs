//! Syntax highlighting as layered regex passes.
//!
//! [`Highlighter::highlight`] recomputes the full span set from scratch on
//! every call; documents here are scratch scripts, small enough that a
//! per-keystroke recompute is cheaper than tracking edits. Classes are
//! applied in fixed precedence: comments first, then strings outside
//! comments, then keywords outside both, with plain text filling the gaps.

use crate::{Result, ScriptpadError};
use regex::Regex;
use scriptpad_types::{SpanClass, StyledSpan};
use serde::{Deserialize, Serialize};

/// Lexical rules a [`Highlighter`] is compiled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxRules {
    /// Line comment marker, e.g. `//`.
    pub line_comment: String,
    /// Block comment delimiters, e.g. `("/*", "*/")`, if the language has
    /// them.
    pub block_comment: Option<(String, String)>,
    /// Characters that both open and close string literals.
    pub string_delimiters: Vec<char>,
    /// Reserved words, matched on word boundaries.
    pub keywords: Vec<String>,
}

impl Default for SyntaxRules {
    fn default() -> Self {
        Self::swift()
    }
}

impl SyntaxRules {
    /// Rules for Swift scratch scripts, the default runner target.
    pub fn swift() -> Self {
        Self {
            line_comment: "//".to_string(),
            block_comment: Some(("/*".to_string(), "*/".to_string())),
            string_delimiters: vec!['"'],
            keywords: [
                "as", "break", "case", "catch", "class", "continue", "default",
                "defer", "do", "else", "enum", "extension", "fallthrough",
                "false", "for", "func", "guard", "if", "import", "in", "init",
                "is", "let", "nil", "private", "protocol", "public", "repeat",
                "return", "self", "static", "struct", "switch", "throw",
                "throws", "true", "try", "typealias", "var", "where", "while",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    /// Rules for Python scripts.
    pub fn python() -> Self {
        Self {
            line_comment: "#".to_string(),
            block_comment: None,
            string_delimiters: vec!['"', '\''],
            keywords: [
                "and", "as", "assert", "async", "await", "break", "class",
                "continue", "def", "del", "elif", "else", "except", "finally",
                "for", "from", "global", "if", "import", "in", "is", "lambda",
                "nonlocal", "not", "or", "pass", "raise", "return", "try",
                "while", "with", "yield", "False", "None", "True",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Whole-document highlighter over a fixed rule set.
///
/// Spans use byte offsets into the document. Every pass returns sorted,
/// non-empty, non-overlapping spans whose union is the whole document.
#[derive(Debug, Clone)]
pub struct Highlighter {
    rules: SyntaxRules,
    line_comment_re: Regex,
    block_comment_re: Option<Regex>,
    string_re: Option<Regex>,
    keyword_re: Option<Regex>,
}

impl Highlighter {
    /// Compile `rules` into a reusable highlighter.
    pub fn new(rules: SyntaxRules) -> Result<Self> {
        if rules.line_comment.is_empty() {
            return Err(ScriptpadError::InvalidSyntaxRules(
                "line comment marker is empty".to_string(),
            ));
        }

        let line_comment_re =
            Regex::new(&format!(r"{}[^\n]*", regex::escape(&rules.line_comment)))?;

        let block_comment_re = match &rules.block_comment {
            Some((open, close)) => {
                if open.is_empty() || close.is_empty() {
                    return Err(ScriptpadError::InvalidSyntaxRules(
                        "block comment markers are empty".to_string(),
                    ));
                }
                let open = regex::escape(open);
                let close = regex::escape(close);
                // Lazy match to the nearest close; unterminated blocks run
                // to end of document via the second alternative.
                Some(Regex::new(&format!(r"(?s){open}.*?{close}|{open}.*"))?)
            }
            None => None,
        };

        let string_re = if rules.string_delimiters.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = rules
                .string_delimiters
                .iter()
                .map(|d| {
                    let d = regex::escape(&d.to_string());
                    // Escape-aware body; the optional closer leaves
                    // unterminated literals running to end of document.
                    format!(r"{d}(?:\\.|[^{d}\\])*{d}?")
                })
                .collect();
            Some(Regex::new(&alternatives.join("|"))?)
        };

        if rules.keywords.iter().any(|k| k.is_empty()) {
            return Err(ScriptpadError::InvalidSyntaxRules(
                "keyword list contains an empty string".to_string(),
            ));
        }
        let keyword_re = if rules.keywords.is_empty() {
            None
        } else {
            let words: Vec<String> =
                rules.keywords.iter().map(|k| regex::escape(k)).collect();
            Some(Regex::new(&format!(r"\b(?:{})\b", words.join("|")))?)
        };

        Ok(Self {
            rules,
            line_comment_re,
            block_comment_re,
            string_re,
            keyword_re,
        })
    }

    pub fn rules(&self) -> &SyntaxRules {
        &self.rules
    }

    /// Classify the whole document into styled spans.
    pub fn highlight(&self, text: &str) -> Vec<StyledSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let comments = self.comment_intervals(text);
        let strings = self.string_intervals(text, &comments);
        let keywords = self.keyword_intervals(text, &comments, &strings);
        assemble(text.len(), &comments, &strings, &keywords)
    }

    /// Union of line and block comment ranges, merged and sorted.
    fn comment_intervals(&self, text: &str) -> Vec<(usize, usize)> {
        let mut intervals: Vec<(usize, usize)> = self
            .line_comment_re
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        if let Some(re) = &self.block_comment_re {
            intervals.extend(re.find_iter(text).map(|m| (m.start(), m.end())));
        }

        merge_intervals(intervals)
    }

    /// String literal ranges. Candidates that open inside a comment are
    /// dropped; overlaps with comments are resolved later in favor of the
    /// comment.
    fn string_intervals(&self, text: &str, comments: &[(usize, usize)]) -> Vec<(usize, usize)> {
        let Some(re) = &self.string_re else {
            return Vec::new();
        };

        re.find_iter(text)
            .map(|m| (m.start(), m.end()))
            .filter(|&(start, _)| !contains_offset(comments, start))
            .collect()
    }

    /// Keyword ranges lying fully outside comments and strings.
    fn keyword_intervals(
        &self,
        text: &str,
        comments: &[(usize, usize)],
        strings: &[(usize, usize)],
    ) -> Vec<(usize, usize)> {
        let Some(re) = &self.keyword_re else {
            return Vec::new();
        };

        re.find_iter(text)
            .map(|m| (m.start(), m.end()))
            .filter(|&iv| !overlaps_any(comments, iv) && !overlaps_any(strings, iv))
            .collect()
    }
}

/// Sort and merge overlapping or touching intervals.
fn merge_intervals(mut intervals: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    intervals.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// True when `offset` falls inside any of the sorted `intervals`.
fn contains_offset(intervals: &[(usize, usize)], offset: usize) -> bool {
    intervals
        .iter()
        .any(|&(start, end)| start <= offset && offset < end)
}

/// True when `iv` intersects any of the `intervals`.
fn overlaps_any(intervals: &[(usize, usize)], iv: (usize, usize)) -> bool {
    intervals
        .iter()
        .any(|&(start, end)| iv.0 < end && start < iv.1)
}

/// Cut away every part of `interval` covered by the sorted `cuts`.
fn subtract(interval: (usize, usize), cuts: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let (mut cursor, end) = interval;
    let mut pieces = Vec::new();

    for &(cut_start, cut_end) in cuts {
        if cut_end <= cursor {
            continue;
        }
        if cut_start >= end {
            break;
        }
        if cut_start > cursor {
            pieces.push((cursor, cut_start));
        }
        cursor = cursor.max(cut_end);
        if cursor >= end {
            break;
        }
    }
    if cursor < end {
        pieces.push((cursor, end));
    }

    pieces
}

/// Stitch classified intervals into a sorted, gap-free span list.
fn assemble(
    len: usize,
    comments: &[(usize, usize)],
    strings: &[(usize, usize)],
    keywords: &[(usize, usize)],
) -> Vec<StyledSpan> {
    let mut classified: Vec<StyledSpan> = Vec::new();

    for &(start, end) in comments {
        classified.push(StyledSpan::new(start, end, SpanClass::Comment));
    }
    // Strings can overlap a comment that began after the string opened;
    // the comment keeps those bytes.
    for &interval in strings {
        for (start, end) in subtract(interval, comments) {
            classified.push(StyledSpan::new(start, end, SpanClass::String));
        }
    }
    for &(start, end) in keywords {
        classified.push(StyledSpan::new(start, end, SpanClass::Keyword));
    }

    classified.sort_by_key(|span| span.start);

    let mut spans: Vec<StyledSpan> = Vec::with_capacity(classified.len() * 2 + 1);
    let mut cursor = 0;
    for span in classified {
        if span.start > cursor {
            spans.push(StyledSpan::new(cursor, span.start, SpanClass::Plain));
        }
        cursor = span.end;
        spans.push(span);
    }
    if cursor < len {
        spans.push(StyledSpan::new(cursor, len, SpanClass::Plain));
    }

    spans
}
