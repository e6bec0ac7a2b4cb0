use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::models::{NewPostRecord, PostRecord};

/// Narrow read/write contract the synchronizer needs from local persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or merge by id without touching existing favourite flags.
    async fn insert_or_merge_records(&self, records: &[NewPostRecord]) -> Result<()>;

    /// Read `limit` records starting at `offset`, ordered by id.
    async fn read_page(&self, limit: i64, offset: i64) -> Result<Vec<PostRecord>>;

    /// Records whose title or body contains `query`, ordered by id.
    async fn search(&self, query: &str) -> Result<Vec<PostRecord>>;

    /// Current favourites, re-emitted whenever the favourites set may have changed.
    ///
    /// Each call starts a fresh subscription that yields the current list first.
    fn watch_favourites(&self) -> BoxStream<'static, Result<Vec<PostRecord>>>;

    /// One-shot read of the current favourites.
    async fn favourites(&self) -> Result<Vec<PostRecord>>;

    /// Set the flag, returning whether the record exists.
    async fn set_favourite_flag(&self, id: i64, value: bool) -> Result<bool>;

    /// Atomically flip the flag, returning the new value (`None` if absent).
    async fn toggle_favourite_flag(&self, id: i64) -> Result<Option<bool>>;

    /// Unflag every favourite, returning how many changed.
    async fn clear_favourites(&self) -> Result<u64>;

    async fn get_count(&self) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PostRecord>>;

    /// Delete the given records, returning how many existed.
    async fn delete_posts(&self, ids: &[i64]) -> Result<u64>;

    /// Delete every cached record.
    async fn delete_all(&self) -> Result<u64>;
}
