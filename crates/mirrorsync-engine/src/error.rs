//! Error types for reconciliation operations.

use thiserror::Error;

/// Errors raised while reconciling metadata between the source and the destination.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request never produced a response (timeout, connection refused, DNS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote service answered with a non-2xx status.
    #[error("API request failed with status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the service.
        body: String,
    },

    /// Rate limit exceeded on the source service.
    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the limit resets.
        retry_after_secs: u64,
    },

    /// An embedded identity marker could not be parsed.
    #[error("Malformed identity marker: {0}")]
    MarkerParse(String),

    /// Release assets on the destination do not match the source.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// A page of a paginated listing failed, so the whole listing is discarded.
    #[error("Failed to fetch page {page}: {source}")]
    Fetch {
        /// One-based page number that failed.
        page: u32,
        /// Underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// Repository reference could not be parsed.
    #[error("Invalid repository reference: {0}")]
    InvalidRepository(String),

    /// External `git` invocation failed.
    #[error("Git command failed: {0}")]
    Git(String),

    /// Configuration could not be loaded or saved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap a page failure into a [`SyncError::Fetch`].
    pub fn fetch(page: u32, source: SyncError) -> Self {
        Self::Fetch {
            page,
            source: Box::new(source),
        }
    }

    /// HTTP status carried by this error, looking through fetch wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the destination reported a conflict (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Whether the resource was not found (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the failure is transient and the next scheduled run should simply retry it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Fetch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => Self::Transport(e.to_string()),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;
