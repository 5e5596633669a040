//! Structured diagnostics extracted from interpreter stderr.

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One `path:line:col: severity: message` record, as emitted by
/// clang-style toolchains.
///
/// Immutable once created. A diagnostic belongs to the session whose
/// stderr produced it and is discarded when a new session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Path exactly as printed by the tool, not resolved or canonicalized.
    pub source_path: String,
    /// 1-based source line.
    pub line: u32,
    /// 1-based source column.
    pub column: u32,
    /// Error or warning.
    pub severity: Severity,
    /// Remainder of the line after the severity marker.
    pub message: String,
}

impl Diagnostic {
    /// Cursor target for jump-to-diagnostic, as `(line, column)`.
    pub fn position(&self) -> (u32, u32) {
        (self.line, self.column)
    }

    /// True for error-severity records.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
