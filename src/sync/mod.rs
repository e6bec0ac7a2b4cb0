//! Reconciles the remote API with the local record store.

mod synchronizer;

pub use synchronizer::PostSynchronizer;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{FavouriteError, FeedError};
use crate::model::{PageResult, Post};

/// Operations the feed and favourites controllers issue against the data layer.
#[async_trait]
pub trait PostFeed: Send + Sync {
    /// Page `page` of the feed, falling back to the cache when the remote fails.
    async fn get_page(&self, page: usize, force_refresh: bool) -> Result<PageResult, FeedError>;

    /// Flip the favourite flag of a cached post, returning the new value.
    async fn toggle_favourite(&self, post_id: i64) -> Result<bool, FavouriteError>;

    /// Cached posts matching `query` in title or body. Never touches the network.
    async fn search_posts(&self, query: &str) -> Result<Vec<Post>, FeedError>;

    /// Continuously updated favourites list, current value first.
    fn favourite_posts(&self) -> BoxStream<'static, Result<Vec<Post>, FeedError>>;

    /// Unflag a post. Succeeds if the post is cached, whatever its prior flag.
    async fn remove_favourite(&self, post_id: i64) -> Result<(), FavouriteError>;

    /// Unflag every favourite, returning how many were cleared.
    async fn clear_favourites(&self) -> Result<u64, FavouriteError>;
}
