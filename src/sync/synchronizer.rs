use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use super::PostFeed;
use crate::config::Config;
use crate::db::{NewPostRecord, RecordStore};
use crate::error::{FavouriteError, FeedError};
use crate::model::{PageResult, Post};
use crate::remote::{PostDto, RemoteSource};

/// Single writer of the record store; serves pages remote-first with cache fallback.
pub struct PostSynchronizer {
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn RecordStore>,
    page_size: usize,
    total_posts: usize,
}

impl PostSynchronizer {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn RecordStore>,
        page_size: usize,
        total_posts: usize,
    ) -> Self {
        Self {
            remote,
            store,
            page_size: page_size.max(1),
            total_posts,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &Config,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self::new(remote, store, config.page_size, config.total_posts)
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch the full remote corpus and merge it into the cache.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or `Unknown` if the merge fails.
    pub async fn warm_cache(&self) -> Result<usize, FeedError> {
        let posts = self.remote.fetch_all().await?;
        let records: Vec<NewPostRecord> = posts.iter().map(NewPostRecord::from).collect();
        self.store
            .insert_or_merge_records(&records)
            .await
            .map_err(|e| FeedError::Unknown(format!("{e:#}")))?;
        info!(count = records.len(), "Cache warmed from remote");
        Ok(records.len())
    }

    /// Drop every cached post, favourites included.
    ///
    /// # Errors
    ///
    /// Returns `Unknown` if the store rejects the delete.
    pub async fn clear_cache(&self) -> Result<u64, FeedError> {
        let deleted = self
            .store
            .delete_all()
            .await
            .map_err(|e| FeedError::Unknown(format!("{e:#}")))?;
        info!(deleted, "Cleared post cache");
        Ok(deleted)
    }

    /// Persist a fetched page and return it with locally known favourite flags.
    async fn merge_remote_page(&self, items: &[PostDto]) -> Vec<Post> {
        let records: Vec<NewPostRecord> = items.iter().map(NewPostRecord::from).collect();

        let favourite_ids: HashSet<i64> = match self.store.insert_or_merge_records(&records).await {
            Ok(()) => match self.store.favourites().await {
                Ok(favourites) => favourites.into_iter().map(|r| r.id).collect(),
                Err(e) => {
                    warn!("Failed to read favourite flags after merge: {e:#}");
                    HashSet::new()
                }
            },
            Err(e) => {
                error!(count = records.len(), "Failed to cache fetched posts: {e:#}");
                HashSet::new()
            }
        };

        records
            .into_iter()
            .map(|r| Post {
                is_favourite: favourite_ids.contains(&r.id),
                id: r.id,
                user_id: r.user_id,
                title: r.title,
                body: r.body,
            })
            .collect()
    }

    /// Cached rows for the same window, or `None` if the cache has none.
    async fn cached_page(&self, start: usize) -> Result<Option<PageResult>> {
        let rows = self
            .store
            .read_page(self.page_size as i64, start as i64)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let total = self.store.get_count().await?.max(0) as usize;
        Ok(Some(PageResult {
            items: rows.into_iter().map(Post::from).collect(),
            has_more: start + self.page_size < total,
            total_count: Some(total),
            from_cache: true,
        }))
    }
}

#[async_trait]
impl PostFeed for PostSynchronizer {
    async fn get_page(&self, page: usize, force_refresh: bool) -> Result<PageResult, FeedError> {
        let start = page * self.page_size;
        debug!(page, start, limit = self.page_size, force_refresh, "Loading page");

        match self.remote.fetch_page(start, self.page_size).await {
            Ok(mut remote_page) => {
                remote_page.items.truncate(self.page_size);
                let total = remote_page.total.unwrap_or(self.total_posts);
                let items = self.merge_remote_page(&remote_page.items).await;

                // A short page is not the end while the known total says otherwise.
                Ok(PageResult {
                    has_more: start + self.page_size < total,
                    total_count: Some(total),
                    items,
                    from_cache: false,
                })
            }
            Err(fetch_err) => {
                warn!(page, error = %fetch_err, "Remote fetch failed, falling back to cache");
                match self.cached_page(start).await {
                    Ok(Some(result)) => {
                        info!(page, count = result.items.len(), "Serving page from cache");
                        Ok(result)
                    }
                    Ok(None) => Err(fetch_err.into()),
                    Err(cache_err) => {
                        error!(page, "Cache fallback failed: {cache_err:#}");
                        Err(fetch_err.into())
                    }
                }
            }
        }
    }

    async fn toggle_favourite(&self, post_id: i64) -> Result<bool, FavouriteError> {
        match self.store.toggle_favourite_flag(post_id).await {
            Ok(Some(is_favourite)) => {
                debug!(post_id, is_favourite, "Toggled favourite");
                Ok(is_favourite)
            }
            Ok(None) => {
                warn!(post_id, "Cannot toggle favourite of uncached post");
                Err(FavouriteError::NotFound(post_id))
            }
            Err(e) => {
                error!(post_id, "Failed to toggle favourite: {e:#}");
                Err(FavouriteError::Storage(format!("{e:#}")))
            }
        }
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>, FeedError> {
        let rows = self
            .store
            .search(query)
            .await
            .map_err(|e| FeedError::Unknown(format!("Search failed: {e:#}")))?;
        debug!(query, count = rows.len(), "Searched cached posts");
        Ok(rows.into_iter().map(Post::from).collect())
    }

    fn favourite_posts(&self) -> BoxStream<'static, Result<Vec<Post>, FeedError>> {
        self.store
            .watch_favourites()
            .map(|rows| {
                rows.map(|rows| rows.into_iter().map(Post::from).collect())
                    .map_err(|e| FeedError::Unknown(format!("{e:#}")))
            })
            .boxed()
    }

    async fn remove_favourite(&self, post_id: i64) -> Result<(), FavouriteError> {
        match self.store.set_favourite_flag(post_id, false).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(FavouriteError::NotFound(post_id)),
            Err(e) => Err(FavouriteError::Storage(format!("{e:#}"))),
        }
    }

    async fn clear_favourites(&self) -> Result<u64, FavouriteError> {
        self.store
            .clear_favourites()
            .await
            .map_err(|e| FavouriteError::Storage(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PostRecord;
    use crate::remote::{FetchError, RemotePage};
    use anyhow::anyhow;
    use futures_util::stream;

    struct FixedRemote {
        items: Vec<PostDto>,
    }

    #[async_trait]
    impl RemoteSource for FixedRemote {
        async fn fetch_page(&self, offset: usize, limit: usize) -> Result<RemotePage, FetchError> {
            Ok(RemotePage {
                items: self.items.iter().skip(offset).take(limit).cloned().collect(),
                total: None,
            })
        }

        async fn fetch_all(&self) -> Result<Vec<PostDto>, FetchError> {
            Ok(self.items.clone())
        }
    }

    struct OfflineRemote;

    #[async_trait]
    impl RemoteSource for OfflineRemote {
        async fn fetch_page(&self, _offset: usize, _limit: usize) -> Result<RemotePage, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }

        async fn fetch_all(&self) -> Result<Vec<PostDto>, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }
    }

    /// Store that rejects every operation.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn insert_or_merge_records(&self, _records: &[NewPostRecord]) -> Result<()> {
            Err(anyhow!("disk full"))
        }
        async fn read_page(&self, _limit: i64, _offset: i64) -> Result<Vec<PostRecord>> {
            Err(anyhow!("disk full"))
        }
        async fn search(&self, _query: &str) -> Result<Vec<PostRecord>> {
            Err(anyhow!("disk full"))
        }
        fn watch_favourites(&self) -> BoxStream<'static, Result<Vec<PostRecord>>> {
            stream::iter(vec![Err(anyhow!("disk full"))]).boxed()
        }
        async fn favourites(&self) -> Result<Vec<PostRecord>> {
            Err(anyhow!("disk full"))
        }
        async fn set_favourite_flag(&self, _id: i64, _value: bool) -> Result<bool> {
            Err(anyhow!("disk full"))
        }
        async fn toggle_favourite_flag(&self, _id: i64) -> Result<Option<bool>> {
            Err(anyhow!("disk full"))
        }
        async fn clear_favourites(&self) -> Result<u64> {
            Err(anyhow!("disk full"))
        }
        async fn get_count(&self) -> Result<i64> {
            Err(anyhow!("disk full"))
        }
        async fn get_by_id(&self, _id: i64) -> Result<Option<PostRecord>> {
            Err(anyhow!("disk full"))
        }
        async fn delete_posts(&self, _ids: &[i64]) -> Result<u64> {
            Err(anyhow!("disk full"))
        }
        async fn delete_all(&self) -> Result<u64> {
            Err(anyhow!("disk full"))
        }
    }

    fn dtos(count: i64) -> Vec<PostDto> {
        (1..=count)
            .map(|id| PostDto {
                id,
                user_id: 1,
                title: format!("title {id}"),
                body: format!("body {id}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_remote_page_survives_store_failure() {
        let sync = PostSynchronizer::new(
            Arc::new(FixedRemote { items: dtos(25) }),
            Arc::new(BrokenStore),
            10,
            25,
        );

        let page = sync.get_page(1, false).await.unwrap();
        let ids: Vec<i64> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, (11..=20).collect::<Vec<_>>());
        assert!(page.has_more);
        assert!(page.items.iter().all(|p| !p.is_favourite));

        let last = sync.get_page(2, false).await.unwrap();
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_remote_error() {
        let sync = PostSynchronizer::new(Arc::new(OfflineRemote), Arc::new(BrokenStore), 10, 100);

        assert_eq!(
            sync.get_page(0, false).await,
            Err(FeedError::Network("connection refused".to_string()))
        );
    }

    #[tokio::test]
    async fn test_store_failures_are_tagged() {
        let sync = PostSynchronizer::new(Arc::new(OfflineRemote), Arc::new(BrokenStore), 10, 100);

        assert!(matches!(
            sync.toggle_favourite(1).await,
            Err(FavouriteError::Storage(_))
        ));
        assert!(matches!(
            sync.search_posts("x").await,
            Err(FeedError::Unknown(_))
        ));
        assert!(matches!(
            sync.clear_favourites().await,
            Err(FavouriteError::Storage(_))
        ));
        assert!(matches!(sync.warm_cache().await, Err(FeedError::Network(_))));
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let sync = PostSynchronizer::new(Arc::new(OfflineRemote), Arc::new(BrokenStore), 0, 100);
        assert_eq!(sync.page_size(), 1);
    }
}
