//! Custom error types for scopusbib.
//!
//! All library functions return `Result<T, ScopusBibError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for scopusbib operations.
#[derive(Debug, Error)]
pub enum ScopusBibError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response or input could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the Scopus API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Scopus API returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// The requested record does not exist in Scopus
    #[error("Not found: {0}")]
    NotFound(String),

    /// BibTeX source could not be parsed
    #[error("BibTeX error in {path}: {message}")]
    Bibtex {
        /// File the entries came from
        path: String,
        /// Parser message
        message: String,
    },

    /// The external record has no cover date, so citation years are unknown
    #[error("Missing publication date for {0}")]
    MissingPublicationDate(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `ScopusBibError`
pub type Result<T> = std::result::Result<T, ScopusBibError>;
