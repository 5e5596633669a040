//! Extraction of structured diagnostics from raw stderr text.

use once_cell::sync::Lazy;
use regex::Regex;
use scriptpad_types::{Diagnostic, Severity};
use tracing::trace;

/// Matches one `path:line:col: severity: message` line as emitted by
/// clang-style toolchains (the Swift frontend included).
static DIAGNOSTIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<path>[^:]+):(?P<line>\d+):(?P<col>\d+):\s*(?P<sev>error|warning):\s*(?P<msg>.*)$")
        .unwrap()
});

/// Stateless extractor of [`Diagnostic`] records from stderr chunks.
///
/// Works one chunk at a time and keeps nothing between calls, so a
/// diagnostic line split across two chunks is not recognized. Lines that
/// do not match the pattern are ignored; callers keep the raw text
/// regardless, extraction is purely additive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticParser;

impl DiagnosticParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract every diagnostic in `raw`, in textual order.
    pub fn parse(&self, raw: &str) -> Vec<Diagnostic> {
        let mut found = Vec::new();

        for line in raw.lines() {
            let line = line.trim();
            let Some(caps) = DIAGNOSTIC_LINE.captures(line) else {
                continue;
            };
            let Ok(line_no) = caps["line"].parse::<u32>() else {
                continue;
            };
            let Ok(column) = caps["col"].parse::<u32>() else {
                continue;
            };
            // Positions are 1-based; a zero means this is not a real
            // diagnostic line.
            if line_no == 0 || column == 0 {
                continue;
            }

            let severity = match &caps["sev"] {
                "error" => Severity::Error,
                _ => Severity::Warning,
            };

            found.push(Diagnostic {
                source_path: caps["path"].to_string(),
                line: line_no,
                column,
                severity,
                message: caps["msg"].to_string(),
            });
        }

        if !found.is_empty() {
            trace!(
                target: "scriptpad::diagnostics",
                "Extracted {} diagnostic(s) from chunk",
                found.len()
            );
        }

        found
    }
}
