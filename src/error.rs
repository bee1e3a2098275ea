// Error types for the hubcache library.
// Handles GitHub API errors, cache errors, and general failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    /// Transport-level failure talking to the GitHub API.
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Network { status: u16, body: String },

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Missing GITHUB_TOKEN environment variable")]
    MissingToken,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl HubError {
    /// Whether this error means "the content does not exist", an expected
    /// condition for e.g. not-yet-published categories.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
