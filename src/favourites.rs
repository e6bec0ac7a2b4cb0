//! Favourites list driven by the store's favourites stream.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::FavouriteError;
use crate::model::Post;
use crate::sync::PostFeed;

/// What the favourites screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState {
    Loading,
    Empty,
    Success(Arc<[Post]>),
    Error(String),
}

impl UiState {
    fn from_posts(posts: Vec<Post>) -> Self {
        if posts.is_empty() {
            Self::Empty
        } else {
            Self::Success(posts.into())
        }
    }
}

#[derive(Clone)]
pub struct FavouritesController {
    inner: Arc<Inner>,
}

struct Inner {
    feed: Arc<dyn PostFeed>,
    state: Arc<watch::Sender<UiState>>,
    /// Ids with a removal in flight.
    deleting: watch::Sender<HashSet<i64>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.watcher.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl FavouritesController {
    #[must_use]
    pub fn new(feed: Arc<dyn PostFeed>) -> Self {
        let (state, _) = watch::channel(UiState::Loading);
        let (deleting, _) = watch::channel(HashSet::new());
        Self {
            inner: Arc::new(Inner {
                feed,
                state: Arc::new(state),
                deleting,
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Create a controller already following the favourites stream.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(feed: Arc<dyn PostFeed>) -> Self {
        let controller = Self::new(feed);
        controller.load();
        controller
    }

    /// (Re)subscribe to the favourites stream, replacing any earlier subscription.
    pub fn load(&self) {
        self.inner.state.send_replace(UiState::Loading);

        let state = Arc::clone(&self.inner.state);
        let mut favourites = self.inner.feed.favourite_posts();
        let handle = tokio::spawn(async move {
            while let Some(update) = favourites.next().await {
                let next = match update {
                    Ok(posts) => {
                        debug!(count = posts.len(), "Favourites updated");
                        UiState::from_posts(posts)
                    }
                    Err(e) => {
                        warn!("Favourites stream error: {e}");
                        UiState::Error(e.to_string())
                    }
                };
                state.send_replace(next);
            }
        });

        let mut slot = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> UiState {
        self.inner.state.borrow().clone()
    }

    /// Ids whose removal is still in flight.
    #[must_use]
    pub fn deleting(&self) -> HashSet<i64> {
        self.inner.deleting.borrow().clone()
    }

    /// Unflag `post` and drop it from the visible list immediately.
    ///
    /// # Errors
    ///
    /// Returns the synchronizer's failure; the state then shows an error.
    pub async fn remove_from_favourites(&self, post: &Post) -> Result<(), FavouriteError> {
        self.inner.deleting.send_modify(|ids| {
            ids.insert(post.id);
        });

        let result = self.inner.feed.remove_favourite(post.id).await;
        match &result {
            Ok(()) => {
                self.inner.state.send_if_modified(|s| {
                    let remaining: Vec<Post> = match &*s {
                        UiState::Success(posts) => {
                            posts.iter().filter(|p| p.id != post.id).cloned().collect()
                        }
                        _ => return false,
                    };
                    *s = UiState::from_posts(remaining);
                    true
                });
            }
            Err(e) => {
                warn!(post_id = post.id, "Failed to remove favourite: {e}");
                self.inner
                    .state
                    .send_replace(UiState::Error("Failed to remove from favourites".to_string()));
            }
        }

        self.inner.deleting.send_modify(|ids| {
            ids.remove(&post.id);
        });
        result
    }

    /// Unflag every favourite. No-op unless favourites are currently shown.
    ///
    /// # Errors
    ///
    /// Returns the synchronizer's failure; the state then shows an error.
    pub async fn clear_all_favourites(&self) -> Result<u64, FavouriteError> {
        if !matches!(*self.inner.state.borrow(), UiState::Success(_)) {
            return Ok(0);
        }
        self.inner.state.send_replace(UiState::Loading);

        match self.inner.feed.clear_favourites().await {
            Ok(cleared) => {
                self.inner.state.send_replace(UiState::Empty);
                Ok(cleared)
            }
            Err(e) => {
                warn!("Failed to clear favourites: {e}");
                self.inner
                    .state
                    .send_replace(UiState::Error("Failed to clear favourites".to_string()));
                Err(e)
            }
        }
    }
}
