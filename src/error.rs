//! Error types shared by the authentication, query and download layers.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the org or preparing a run.
#[derive(Error, Debug)]
pub enum Error {
    /// The token endpoint answered with a non-success status.
    #[error("Authentication failed with status {status}: {body}")]
    Authentication { status: StatusCode, body: String },

    /// The authentication response lacks one or more required fields.
    #[error("Authentication response is missing required fields: {}", .0.join(", "))]
    MissingField(Vec<String>),

    /// A response body or field could not be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The query endpoint answered with a non-success status.
    #[error("Query failed with status {status}: {body}")]
    Query { status: StatusCode, body: String },

    /// The log file endpoint answered with a non-success status.
    #[error("Download failed with status {status}: {body}")]
    Download { status: StatusCode, body: String },

    /// A configuration value is absent or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
