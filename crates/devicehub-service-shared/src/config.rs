//! Service configuration read from the environment at startup.
//!
//! | variable | default |
//! |---|---|
//! | `SERVICE_PORT` | `8080` |
//! | `LOCALES_BASE_PATH` | `./resources/locales` |
//! | `LOCALES_SUPPORTED_LANGUAGES` | `en` |
//! | `ALLOWED_ORIGIN` | empty (no cross-origin callers) |
//! | `MAX_BODY_BYTES` | `2097152` |
//!
//! Logging variables are documented on [`LoggingConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use devicehub_lib::{Localizer, DEFAULT_BASE_PATH, DEFAULT_LANGUAGE};

use crate::logging::LoggingConfig;
use crate::transport::DEFAULT_MAX_BODY_BYTES;

/// Port used when `SERVICE_PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 8080;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub port: u16,
    /// CORS allow-list. `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl HttpConfig {
    /// Address to bind on all interfaces.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Message catalog settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    pub base_path: PathBuf,
    /// Comma-separated language tags.
    pub supported_languages: String,
}

/// Everything a service needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    pub locales: LocaleConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = match lookup("SERVICE_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, default = DEFAULT_PORT, "invalid SERVICE_PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, default = DEFAULT_MAX_BODY_BYTES, "invalid MAX_BODY_BYTES, using default");
                DEFAULT_MAX_BODY_BYTES
            }),
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let allowed_origins = lookup("ALLOWED_ORIGIN")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let base_path = lookup("LOCALES_BASE_PATH")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
        let supported_languages = lookup("LOCALES_SUPPORTED_LANGUAGES")
            .map(|v| v.replace(' ', ""))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Self {
            http: HttpConfig {
                port,
                allowed_origins,
                max_body_bytes,
            },
            locales: LocaleConfig {
                base_path: PathBuf::from(base_path),
                supported_languages,
            },
            logging: LoggingConfig::from_lookup(lookup),
        }
    }

    /// Build the localizer for the configured catalogs. Catalogs load on first
    /// use or on an explicit [`Localizer::initialize`].
    pub fn localizer(&self) -> Arc<Localizer> {
        Arc::new(Localizer::with_settings(
            self.locales.base_path.clone(),
            &self.locales.supported_languages,
        ))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        ServiceConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.http.port, DEFAULT_PORT);
        assert!(config.http.allowed_origins.is_empty());
        assert_eq!(config.locales.base_path, PathBuf::from(DEFAULT_BASE_PATH));
        assert_eq!(config.locales.supported_languages, "en");
        assert_eq!(config.http.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = config(&[
            ("SERVICE_PORT", "9090"),
            ("ALLOWED_ORIGIN", "https://a.example, https://b.example"),
            ("LOCALES_BASE_PATH", "/srv/locales"),
            ("LOCALES_SUPPORTED_LANGUAGES", "en, es"),
            ("LOG_LEVEL", "debug"),
        ]);
        assert_eq!(config.http.port, 9090);
        assert_eq!(
            config.http.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.locales.base_path, PathBuf::from("/srv/locales"));
        assert_eq!(config.locales.supported_languages, "en,es");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_port_falls_back() {
        assert_eq!(config(&[("SERVICE_PORT", "http")]).http.port, DEFAULT_PORT);
    }

    #[test]
    fn test_max_body_bytes() {
        assert_eq!(config(&[("MAX_BODY_BYTES", "4096")]).http.max_body_bytes, 4096);
        assert_eq!(
            config(&[("MAX_BODY_BYTES", "lots")]).http.max_body_bytes,
            DEFAULT_MAX_BODY_BYTES
        );
    }

    #[test]
    fn test_socket_addr_binds_all_interfaces() {
        let addr = config(&[("SERVICE_PORT", "3000")]).http.socket_addr();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_localizer_uses_locale_settings() {
        let localizer = config(&[
            ("LOCALES_BASE_PATH", "/srv/locales"),
            ("LOCALES_SUPPORTED_LANGUAGES", "en,es"),
        ])
        .localizer();
        assert_eq!(localizer.base_path(), PathBuf::from("/srv/locales"));
        assert_eq!(localizer.supported_languages(), vec!["en", "es"]);
        assert!(!localizer.is_initialized());
    }
}
