//! Tagged failures returned across the synchronizer boundary.

use thiserror::Error;

/// Failure of a page fetch or search after every fallback was tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// No connectivity or the request failed before a response arrived.
    #[error("network error: {0}")]
    Network(String),
    /// The remote answered with a non-success status.
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },
    /// Persistence or search failed.
    #[error("{0}")]
    Unknown(String),
}

impl FeedError {
    /// Whether the failure came from the remote and a later retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { .. })
    }
}

/// Failure of a favourite-flag mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FavouriteError {
    /// The post has never been cached locally.
    #[error("post {0} is not cached locally")]
    NotFound(i64),
    /// The store rejected the write.
    #[error("failed to update favourite: {0}")]
    Storage(String),
}
