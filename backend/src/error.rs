//! Error types for the showstats pipeline.
//!
//! This module defines one error type per layer:
//!
//! - [`FetchError`] - Remote or local source failures
//! - [`RegistryError`] - Source registry loading errors
//! - [`LoadError`] - Table loading errors (config, fetch, schema)
//! - [`SettingsError`] - Environment configuration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. CSV parsing keeps its own
//! line-aware [`crate::parser::CsvError`].

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Source Fetch Errors
// =============================================================================

/// Errors raised by a [`crate::loader::TableSource`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Could not build the export URL.
    #[error("Invalid source URL: {0}")]
    Url(#[from] url::ParseError),

    /// Local file could not be read.
    #[error("Failed to read source file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from loading a source registry file.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Registry content violates the registry schema.
    #[error("Invalid registry: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors from loading a year's table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Year key not present in the source registry.
    #[error("Unknown year '{year}': not configured in the source registry")]
    Config { year: String },

    /// Remote fetch failed or returned unparsable tabular data.
    #[error("Failed to fetch source for year '{year}': {message}")]
    SourceFetch { year: String, message: String },

    /// No program column could be resolved after normalization.
    #[error(
        "Could not resolve a program column for year '{year}': expected something like '{hint}', 'program name' or 'section name'"
    )]
    Schema { year: String, hint: String },
}

impl LoadError {
    pub(crate) fn fetch(year: &str, err: FetchError) -> Self {
        LoadError::SourceFetch {
            year: year.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(year: &str, err: CsvError) -> Self {
        LoadError::SourceFetch {
            year: year.to_string(),
            message: format!("unparsable tabular data: {}", err),
        }
    }
}

// =============================================================================
// Settings Errors
// =============================================================================

/// Errors from reading settings or wiring the loader from them.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Variable present but not parsable.
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    /// Registry file could not be loaded.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// HTTP client could not be built.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Table loading error.
    #[error("{0}")]
    Load(#[from] LoadError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for table loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for settings.
pub type SettingsResult<T> = Result<T, SettingsError>;
