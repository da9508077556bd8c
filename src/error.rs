//! Error types for the WordPress exporter

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigField;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the WordPress exporter
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A flag that is mandatory when no config file is given was left empty
    #[error("flag --{flag} is required when --wpconfig is not set")]
    MissingRequiredParameter { flag: &'static str },

    /// The wp-config.php file could not be read
    #[error("could not read {}: {source}", .path.display())]
    ConfigFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required definition was not found in wp-config.php
    #[error("could not find {field} in wp-config.php")]
    MissingConfigField { field: ConfigField },

    /// Malformed configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Opening the per-scrape database connection failed
    #[error("Error connecting to database: {0}")]
    DatabaseConnectionFailed(#[source] sqlx::Error),

    /// One of the count queries failed
    #[error("Query against {table} failed: {source}")]
    DatabaseQueryFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    // =========================================================================
    // Metrics / HTTP Errors
    // =========================================================================
    /// Metric descriptor rejected at registration
    #[error("Metrics registration failed: {0}")]
    MetricsRegistration(String),

    /// Prometheus client error
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Listener could not be bound
    #[error("Failed to bind metrics server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error stops the exporter under the strict scrape policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DatabaseConnectionFailed(_) | Error::DatabaseQueryFailed { .. }
        )
    }
}
