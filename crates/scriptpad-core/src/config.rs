//! Runner configuration.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Configuration for [`ScriptRunner`](crate::ScriptRunner).
///
/// Defaults target Swift scratch scripts run through `swift main.swift`.
/// Point `interpreter` at any tool that accepts a script path as its last
/// argument to run something else.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Interpreter executable, resolved through `PATH` unless absolute.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    /// Arguments placed before the script path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,
    /// Extension given to the staged script file.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    /// Environment variables set on the child. The default disables the
    /// Swift runtime's stdout buffering so output streams as it is printed.
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,
    /// Capacity of the subscriber-facing event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Capacity of the stdin forwarding queue.
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,
    /// Read size for the stdout/stderr pipe readers, in bytes.
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    /// Byte cap on retained transcript output.
    #[serde(default = "default_transcript_max_bytes")]
    pub transcript_max_bytes: usize,
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("swift")
}

fn default_script_extension() -> String {
    "swift".to_string()
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([("NSUnbufferedIO".to_string(), "YES".to_string())])
}

fn default_event_capacity() -> usize {
    256
}

fn default_input_capacity() -> usize {
    32
}

fn default_read_buffer_bytes() -> usize {
    4096
}

fn default_transcript_max_bytes() -> usize {
    crate::transcript::DEFAULT_MAX_BYTES
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: Vec::new(),
            script_extension: default_script_extension(),
            env: default_env(),
            event_capacity: default_event_capacity(),
            input_capacity: default_input_capacity(),
            read_buffer_bytes: default_read_buffer_bytes(),
            transcript_max_bytes: default_transcript_max_bytes(),
        }
    }
}

impl RunnerConfig {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RunnerConfig = toml::from_str(&content)?;
        debug!(target: "scriptpad::config", "Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load config from the default location (scriptpad.toml in the working
    /// directory) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("scriptpad.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(RunnerConfig::default())
    }

    /// File name the script is staged under, e.g. `main.swift`.
    pub fn script_file_name(&self) -> String {
        format!("main.{}", self.script_extension)
    }
}
