use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the devicehub library.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type crossing the business-layer boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level library error type.
///
/// These never reach an HTTP caller: catalog problems are logged and the
/// affected language is skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a message catalog file cannot be read.
    #[error("could not read message file {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised when a message catalog file is not valid YAML.
    #[error("could not parse message file {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Raised when a catalog's top level is not a mapping of message ids.
    #[error("message file {path} must contain a mapping of message ids")]
    CatalogShape { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape_display_includes_path() {
        let err = Error::CatalogShape {
            path: PathBuf::from("/tmp/en.yml"),
        };
        assert!(err.to_string().contains("/tmp/en.yml"));
    }

    #[test]
    fn test_catalog_read_exposes_source() {
        let err = Error::CatalogRead {
            path: PathBuf::from("missing.yml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("gone"));
    }
}
