//! Error types for the language server.

use thiserror::Error;

/// Errors surfaced by configuration loading and embedded-content lookups.
///
/// Parse tolerance and missing capabilities are not errors: malformed blocks
/// are absorbed by the scanner and unsupported features yield empty results.
#[derive(Debug, Error)]
pub enum Error {
    /// The settings file could not be parsed.
    #[error("Invalid settings in {path}: {message}")]
    Settings { path: String, message: String },

    /// An embedded-content URI did not follow `embedded-content://<lang>/<uri>.<lang>`.
    #[error("Invalid embedded content URI: {uri}")]
    InvalidEmbeddedUri { uri: String },

    /// The host document is not open.
    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_embedded_uri(uri: impl Into<String>) -> Self {
        Error::InvalidEmbeddedUri { uri: uri.into() }
    }
}
