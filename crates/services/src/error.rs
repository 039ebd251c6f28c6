//! Shared error types for the services crate.
//!
//! Only read paths and configuration have errors here: delivery failures
//! never leave the dispatcher.

use thiserror::Error;

use transport::SourceError;

/// Errors emitted while reading `TelemetryConfig` from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid analytics base URL {raw:?}: {source}")]
    InvalidBaseUrl {
        raw: String,
        source: url::ParseError,
    },
    #[error("analytics base URL must be http or https, got {scheme:?}")]
    UnsupportedScheme { scheme: String },
    #[error("{key} must be a positive integer, got {raw:?}")]
    InvalidNumber { key: &'static str, raw: String },
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("analytics data is unavailable: {0}")]
    Source(#[from] SourceError),
}
