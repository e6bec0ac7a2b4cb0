//! Remote paged posts API.

mod client;

pub use client::HttpPostSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FeedError;

/// A post as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

/// One fetched window of posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePage {
    pub items: Vec<PostDto>,
    /// Corpus size reported by the remote, when it reports one.
    pub total: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("remote returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<FetchError> for FeedError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { code, message } => Self::Api { code, message },
            FetchError::Network(message) | FetchError::Decode(message) => Self::Network(message),
        }
    }
}

/// Source of remote post pages, addressed by additive offset.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch posts `[offset, offset + limit)`.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<RemotePage, FetchError>;

    /// Fetch the whole corpus in one request.
    async fn fetch_all(&self) -> Result<Vec<PostDto>, FetchError>;
}
