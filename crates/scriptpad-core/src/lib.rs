//! Core execution and text services for scriptpad.
//!
//! The pieces a scratchpad front end builds on: a [`ScriptRunner`] that
//! executes the current script in a child interpreter and streams its
//! output, a [`DiagnosticParser`] for clang-style stderr lines, a
//! [`Highlighter`] over configurable [`SyntaxRules`], and delimiter
//! auto-closing helpers.

mod config;
mod delimiters;
mod diagnostics;
mod error;
mod highlight;
pub mod logging;
mod process;
mod session;
mod transcript;

pub use config::RunnerConfig;
pub use delimiters::{auto_close, closing_delimiter, PairInsertion};
pub use diagnostics::DiagnosticParser;
pub use error::ScriptpadError;
pub use highlight::{Highlighter, SyntaxRules};
pub use session::ScriptRunner;
pub use transcript::{Transcript, DEFAULT_MAX_BYTES};

/// Result type for scriptpad operations.
pub type Result<T> = std::result::Result<T, ScriptpadError>;
