//! Auth error types.

/// Errors that can occur while authenticating a subscriber token.
///
/// Callers treat every variant uniformly as rejection; the split only
/// exists for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request to the review endpoint failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The review endpoint answered with a non-success status.
    #[error("token review failed ({status}): {message}")]
    Review {
        /// HTTP status code (0 if no response).
        status: u16,
        /// Error description.
        message: String,
    },

    /// The token was examined and rejected.
    #[error("token rejected: {0}")]
    Rejected(String),
}
