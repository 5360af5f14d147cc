//! Error types for the navigation transport.

use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while fetching a navigation response.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP request failed before a response was read.
    #[error("request failed: {0}")]
    Http(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The server marked the response as a shell response but the body could not be decoded.
    #[error("malformed shell response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL is not http or https.
    #[error("unsupported base url scheme '{0}'")]
    UnsupportedScheme(String),

    /// A configured header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The worker exited without reporting a result.
    #[error("request worker disconnected")]
    Disconnected,
}
