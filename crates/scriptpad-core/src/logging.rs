//! Logging configuration and initialization.
//!
//! The core only emits `tracing` events under `scriptpad::*` targets and
//! never installs a subscriber on its own. Embedding hosts call [`init`]
//! (or [`try_init`] where a subscriber may already be set, e.g. in tests)
//! with a [`LogConfig`] built from their own settings UI or environment.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Production: session lifecycle and problems only
    #[default]
    Production,
    /// Debug: detailed info for troubleshooting
    Debug,
    /// Trace: everything including per-chunk data
    Trace,
    /// Quiet: warnings and errors only
    Quiet,
}

/// Logging configuration supplied by the embedding host.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Base preset to use
    pub preset: LogPreset,
    /// Per-target level overrides (e.g., "process" -> DEBUG)
    pub overrides: HashMap<String, Level>,
    /// Output format
    pub format: LogFormat,
}

impl LogConfig {
    pub fn with_preset(preset: LogPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    /// Add a per-target override. Bare names are namespaced under
    /// `scriptpad::`, so `"process"` means `scriptpad::process`.
    pub fn add_override(&mut self, target: &str, level: Level) {
        let full_target = if target.starts_with("scriptpad") {
            target.to_string()
        } else {
            format!("scriptpad::{}", target)
        };
        self.overrides.insert(full_target, level);
    }

    /// Build an EnvFilter from this configuration.
    pub fn build_filter(&self) -> EnvFilter {
        // RUST_LOG takes precedence over everything configured here.
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let mut directives: Vec<String> = match self.preset {
            LogPreset::Production => vec![
                "scriptpad::session=info".into(),
                "scriptpad::process=info".into(),
                "scriptpad::diagnostics=warn".into(),
                "scriptpad::transcript=warn".into(),
                "scriptpad::config=info".into(),
            ],
            LogPreset::Debug => vec!["scriptpad=debug".into()],
            LogPreset::Trace => vec!["scriptpad=trace".into()],
            LogPreset::Quiet => vec!["scriptpad=warn".into()],
        };

        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level_to_str(*level)));
        }

        let filter_str = directives.join(",");
        EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Convert a Level to its filter string representation.
fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Panics if a global subscriber is already installed; use [`try_init`]
/// when that is a possibility.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}

/// Fallible variant of [`init`] that leaves an existing subscriber in place.
pub fn try_init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .try_init()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_add_override_namespaces_bare_targets() {
        let mut config = LogConfig::default();
        config.add_override("process", Level::DEBUG);
        config.add_override("scriptpad::session", Level::TRACE);

        assert_eq!(config.overrides.get("scriptpad::process"), Some(&Level::DEBUG));
        assert_eq!(config.overrides.get("scriptpad::session"), Some(&Level::TRACE));
    }

    #[test]
    fn test_default_config_is_production_text() {
        let config = LogConfig::default();
        assert_eq!(config.preset, LogPreset::Production);
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.overrides.is_empty());
    }
}
