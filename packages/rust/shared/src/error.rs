//! Error types for fleetsql.
//!
//! Library crates use [`FleetSqlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all fleetsql operations.
#[derive(Debug, thiserror::Error)]
pub enum FleetSqlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A package document is malformed or has an unexpected shape.
    #[error("{}:{line}:{column}: {message}", path.display())]
    Document {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// A value could not be converted to its JSON interchange form.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A processor's attributes could not be flattened.
    #[error("failed to flatten processor at {locator}: {message}")]
    Flatten { locator: String, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Writing one package failed; its transaction was rolled back.
    #[error("failed inserting {package:?}: {source}")]
    Package {
        package: String,
        #[source]
        source: Box<FleetSqlError>,
    },

    /// A submitted statement was rejected by the store.
    #[error("query error: {0}")]
    Query(String),

    /// The query transport could not bind, read or write.
    #[error("transport error: {0}")]
    Transport(String),

    /// A background task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FleetSqlError>;

impl FleetSqlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a document error pointing at a file position.
    pub fn document(
        path: impl Into<PathBuf>,
        line: usize,
        column: usize,
        msg: impl Into<String>,
    ) -> Self {
        Self::Document {
            path: path.into(),
            line,
            column,
            message: msg.into(),
        }
    }

    /// Create a flatten error for the processor at `locator`.
    pub fn flatten(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Flatten {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    /// Wrap an error raised while writing the package in directory `package`.
    pub fn package(package: impl Into<String>, source: FleetSqlError) -> Self {
        Self::Package {
            package: package.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FleetSqlError::config("missing corpus directory");
        assert_eq!(err.to_string(), "config error: missing corpus directory");

        let err = FleetSqlError::document("pkg/manifest.yml", 4, 3, "expected a mapping");
        assert_eq!(err.to_string(), "pkg/manifest.yml:4:3: expected a mapping");
    }

    #[test]
    fn package_error_names_directory() {
        let err = FleetSqlError::package("nginx", FleetSqlError::Storage("disk full".into()));
        let msg = err.to_string();
        assert!(msg.contains("\"nginx\""));
        assert!(msg.contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
