//! Error types for `pcsetup` core library.

use thiserror::Error;

/// Result type alias using `pcsetup` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the setup workflow.
///
/// Every variant is terminal for the user action that produced it: nothing in
/// the client retries automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, invalid or expired credentials. The session has been cleared.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Local precondition failed; no network call was made.
    #[error("{0}")]
    Validation(String),

    /// Non-success HTTP response carrying the server's detail message.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport failure before a response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error ended the session.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
