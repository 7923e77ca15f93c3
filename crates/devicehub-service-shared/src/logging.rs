//! Structured logging setup for devicehub services.
//!
//! This module provides:
//! - [`LoggingConfig`]: Configuration for the logging system
//! - [`init_logging`]: Initialize tracing with JSON or text formatting
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: Output format, either `json` (default) or `text`
//! - `RUST_LOG`: Log filter directives; takes precedence over `LOG_LEVEL`
//! - `LOG_LEVEL`: Plain log level (default: `info`)
//! - `SERVICE_NAME`: Service name reported by the `logging initialized` record
//!
//! # Example
//!
//! ```no_run
//! use devicehub_service_shared::logging::{init_logging, LoggingConfig};
//!
//! let config = LoggingConfig::from_env();
//! init_logging(&config);
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logging (default, production).
    #[default]
    Json,
    /// Human-readable text logging (development).
    Text,
}

impl LogFormat {
    /// Parse a log format name.
    ///
    /// Accepts "json", "text", or "pretty" (alias for text).
    /// Returns `Json` for any other value.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format (json or text).
    pub format: LogFormat,
    /// Log filter (e.g., "info", "debug", "devicehub_lib=debug,info").
    pub level: String,
    /// Service name included in log entries.
    pub service: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            service: None,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = lookup("LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default();

        let level = lookup("RUST_LOG")
            .or_else(|| lookup("LOG_LEVEL"))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        let service = lookup("SERVICE_NAME").filter(|v| !v.is_empty());

        Self {
            format,
            level,
            service,
        }
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. The first record names the service and format. A
/// second call logs a warning and leaves the first subscriber in place.
///
/// # JSON Format (default)
///
/// ```json
/// {"timestamp":"2026-01-10T10:00:00Z","level":"INFO","fields":{"message":"listening"},"target":"devicehub_service_devices"}
/// ```
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false);

            registry.with(json_layer).try_init()
        }
    };

    match installed {
        Ok(()) => announce(config),
        Err(err) => tracing::warn!(error = %err, "logging already initialized"),
    }
}

fn announce(config: &LoggingConfig) {
    tracing::info!(
        service = config.service.as_deref().unwrap_or("-"),
        format = ?config.format,
        filter = %config.level,
        "logging initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
        assert_eq!(LogFormat::parse(" Pretty "), LogFormat::Text);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Json);
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert!(config.service.is_none());
    }

    #[test]
    fn test_logging_config_from_empty_lookup() {
        assert_eq!(LoggingConfig::from_lookup(lookup(&[])), LoggingConfig::default());
    }

    #[test]
    fn test_rust_log_wins_over_log_level() {
        let config = LoggingConfig::from_lookup(lookup(&[
            ("RUST_LOG", "debug"),
            ("LOG_LEVEL", "warn"),
        ]));
        assert_eq!(config.level, "debug");

        let config = LoggingConfig::from_lookup(lookup(&[("LOG_LEVEL", "warn")]));
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn test_logging_config_reads_format_and_service() {
        let config = LoggingConfig::from_lookup(lookup(&[
            ("LOG_FORMAT", "text"),
            ("SERVICE_NAME", "devices"),
        ]));
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.service.as_deref(), Some("devices"));
    }

    #[test]
    fn test_startup_record_names_the_service() {
        let logs = crate::test_utils::CapturedLogs::new();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        announce(&LoggingConfig::from_lookup(lookup(&[("SERVICE_NAME", "devices")])));

        let record = logs.find("logging initialized").unwrap();
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["service"], "devices");
    }

    #[test]
    fn test_logging_config_with_service() {
        let config = LoggingConfig::default().with_service("devices");
        assert_eq!(config.service, Some("devices".to_string()));
    }
}
