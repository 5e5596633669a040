//! Error types for scriptpad.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptpadError {
    #[error("Failed to stage script: {0}")]
    ScriptStage(String),

    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Invalid session state: expected {expected}, got {actual}")]
    InvalidSessionState { expected: String, actual: String },

    #[error("Input channel closed")]
    InputChannelClosed,

    #[error("Invalid syntax rules: {0}")]
    InvalidSyntaxRules(String),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
