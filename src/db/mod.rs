mod migrations;
mod models;
mod queries;
mod store;

pub use models::*;
pub use queries::*;
pub use store::RecordStore;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    /// Bumped after every write that can change the favourites set.
    favourites_version: Arc<watch::Sender<u64>>,
}

impl Database {
    /// Create a new database connection, running migrations if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Favourite toggles may race a page merge; writers wait instead of failing.
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let (favourites_version, _) = watch::channel(0);
        let db = Self {
            pool,
            favourites_version: Arc::new(favourites_version),
        };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all pending migrations.
    async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn notify_favourites_changed(&self) {
        self.favourites_version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn insert_or_merge_records(&self, records: &[NewPostRecord]) -> Result<()> {
        insert_or_merge_posts(&self.pool, records).await?;
        debug!(count = records.len(), "Merged posts into cache");
        // Merged rows keep their flags but their titles/bodies may have changed.
        self.notify_favourites_changed();
        Ok(())
    }

    async fn read_page(&self, limit: i64, offset: i64) -> Result<Vec<PostRecord>> {
        get_posts_page(&self.pool, limit, offset).await
    }

    async fn search(&self, query: &str) -> Result<Vec<PostRecord>> {
        search_posts(&self.pool, query).await
    }

    fn watch_favourites(&self) -> BoxStream<'static, Result<Vec<PostRecord>>> {
        let pool = self.pool.clone();
        let mut changes = self.favourites_version.subscribe();

        Box::pin(async_stream::stream! {
            loop {
                // Mark the current version seen before reading so a write that
                // lands during the query triggers another emission.
                changes.borrow_and_update();
                yield get_favourite_posts(&pool).await;
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn favourites(&self) -> Result<Vec<PostRecord>> {
        get_favourite_posts(&self.pool).await
    }

    async fn set_favourite_flag(&self, id: i64, value: bool) -> Result<bool> {
        let found = set_favourite_status(&self.pool, id, value).await?;
        if found {
            self.notify_favourites_changed();
        }
        Ok(found)
    }

    async fn toggle_favourite_flag(&self, id: i64) -> Result<Option<bool>> {
        let toggled = toggle_favourite_status(&self.pool, id).await?;
        if toggled.is_some() {
            self.notify_favourites_changed();
        }
        Ok(toggled)
    }

    async fn clear_favourites(&self) -> Result<u64> {
        let cleared = clear_favourites(&self.pool).await?;
        if cleared > 0 {
            self.notify_favourites_changed();
        }
        Ok(cleared)
    }

    async fn get_count(&self) -> Result<i64> {
        count_posts(&self.pool).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PostRecord>> {
        get_post_by_id(&self.pool, id).await
    }

    async fn delete_posts(&self, ids: &[i64]) -> Result<u64> {
        let deleted = delete_posts(&self.pool, ids).await?;
        if deleted > 0 {
            self.notify_favourites_changed();
        }
        Ok(deleted)
    }

    async fn delete_all(&self) -> Result<u64> {
        let deleted = clear_all_posts(&self.pool).await?;
        self.notify_favourites_changed();
        Ok(deleted)
    }
}
