use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{with_favourite, FeedState};
use crate::constants::FIRST_PAGE;
use crate::error::{FavouriteError, FeedError};
use crate::model::{PageResult, Post, SearchState};
use crate::sync::PostFeed;

/// Owner of the feed state. Cheap to clone; clones share one state.
///
/// Operations are meant to be driven from a single logical flow. The loading
/// flags guard against overlapping fetches but are not a lock.
#[derive(Clone)]
pub struct FeedController {
    inner: Arc<Inner>,
}

struct Inner {
    feed: Arc<dyn PostFeed>,
    state: watch::Sender<FeedState>,
    /// Token of the pending or running search, if any.
    search_token: Mutex<Option<CancellationToken>>,
    debounce: Duration,
}

impl FeedController {
    /// Create a controller without loading anything.
    #[must_use]
    pub fn new(feed: Arc<dyn PostFeed>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            inner: Arc::new(Inner {
                feed,
                state,
                search_token: Mutex::new(None),
                debounce,
            }),
        }
    }

    /// Create a controller and start loading the first page in the background.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(feed: Arc<dyn PostFeed>, debounce: Duration) -> Self {
        let controller = Self::new(feed, debounce);
        let background = controller.clone();
        tokio::spawn(async move { background.load_first_page().await });
        controller
    }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.inner.state.subscribe()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> FeedState {
        self.inner.state.borrow().clone()
    }

    /// Load page 0, replacing the accumulated list on success.
    pub async fn load_first_page(&self) {
        let mut generation = None;
        self.inner.state.send_if_modified(|s| {
            if s.pagination.is_busy() || s.is_refreshing {
                return false;
            }
            s.pagination.is_loading = true;
            s.pagination.error = None;
            generation = Some(s.generation);
            true
        });
        let Some(generation) = generation else {
            debug!("First page load skipped, another load is in flight");
            return;
        };

        let result = self.inner.feed.get_page(FIRST_PAGE, false).await;

        self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                debug!(generation, "Discarding stale first page");
                return false;
            }
            s.pagination.is_loading = false;
            apply_first_page(s, result);
            true
        });
    }

    /// Append the next page. No-op while loading, in search mode, or when exhausted.
    pub async fn load_next_page(&self) {
        let mut request = None;
        self.inner.state.send_if_modified(|s| {
            if s.is_search_mode
                || s.is_refreshing
                || s.pagination.is_busy()
                || !s.pagination.has_more_data
            {
                return false;
            }
            s.pagination.is_loading_more = true;
            request = Some((s.pagination.current_page, s.generation));
            true
        });
        let Some((page, generation)) = request else {
            return;
        };

        let result = self.inner.feed.get_page(page, false).await;

        self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                debug!(page, generation, "Discarding stale page");
                return false;
            }
            s.pagination.is_loading_more = false;
            match result {
                Ok(page_result) => {
                    let mut posts = s.accumulated.to_vec();
                    posts.extend(page_result.items);
                    s.accumulated = posts.into();
                    s.pagination.current_page = page + 1;
                    s.pagination.has_more_data = page_result.has_more;
                    s.pagination.error = None;
                }
                Err(e) => {
                    warn!(page, retryable = e.is_retryable(), "Failed to load next page: {e}");
                    s.pagination.error = Some(e.to_string());
                }
            }
            true
        });
    }

    /// Re-fetch page 0, or re-run the current search when in search mode.
    ///
    /// On failure the previous list stays visible alongside the error.
    pub async fn refresh(&self) {
        if self.inner.state.borrow().is_search_mode {
            let query = self.inner.state.borrow().query.clone();
            let token = self.replace_search_token(true);
            self.run_search(token, query).await;
            return;
        }

        let mut generation = 0;
        self.inner.state.send_modify(|s| {
            s.bump_generation();
            s.is_refreshing = true;
            generation = s.generation;
        });
        let _guard = RefreshGuard {
            state: &self.inner.state,
            generation,
        };

        let result = self.inner.feed.get_page(FIRST_PAGE, true).await;

        self.inner.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.is_refreshing = false;
            apply_first_page(s, result);
            true
        });
    }

    /// React to a new search query.
    ///
    /// A blank query leaves search mode at once; anything else schedules a
    /// search after the debounce period, superseding any pending one.
    pub fn on_query_changed(&self, text: &str) {
        if text.trim().is_empty() {
            self.exit_search_mode();
            return;
        }

        let token = self.replace_search_token(true);
        self.inner.state.send_modify(|s| {
            s.query = text.to_string();
            if !s.is_search_mode {
                s.bump_generation();
                s.is_search_mode = true;
            }
        });

        let controller = self.clone();
        let query = text.to_string();
        let debounce = self.inner.debounce;
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(debounce) => controller.run_search(token, query).await,
            }
        });
    }

    /// Leave search mode and show the accumulated list again.
    pub fn exit_search_mode(&self) {
        self.replace_search_token(false);
        self.inner.state.send_if_modified(|s| {
            let was_searching = s.is_search_mode;
            if was_searching {
                s.bump_generation();
            }
            s.is_search_mode = false;
            s.search = SearchState::Idle;
            let had_query = !s.query.is_empty();
            s.query.clear();
            was_searching || had_query
        });
    }

    /// Toggle a post's favourite flag and fold the result into both the
    /// accumulated list and any active search results.
    ///
    /// # Errors
    ///
    /// Returns the synchronizer's error; displayed lists are left unchanged.
    pub async fn toggle_favourite(&self, post: &Post) -> Result<bool, FavouriteError> {
        let is_favourite = match self.inner.feed.toggle_favourite(post.id).await {
            Ok(value) => value,
            Err(e) => {
                warn!(post_id = post.id, "Favourite toggle failed: {e}");
                self.inner
                    .state
                    .send_modify(|s| s.pagination.error = Some(e.to_string()));
                return Err(e);
            }
        };

        self.inner.state.send_modify(|s| {
            if s.accumulated.iter().any(|p| p.id == post.id) {
                s.accumulated = with_favourite(&s.accumulated, post.id, is_favourite);
            }
            let updated_search = match &s.search {
                SearchState::Results { items, query } if items.iter().any(|p| p.id == post.id) => {
                    Some(SearchState::Results {
                        items: with_favourite(items, post.id, is_favourite),
                        query: query.clone(),
                    })
                }
                _ => None,
            };
            if let Some(search) = updated_search {
                s.search = search;
            }
        });
        Ok(is_favourite)
    }

    /// Dismiss the current error.
    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|s| {
            let mut changed = s.pagination.error.take().is_some();
            if matches!(s.search, SearchState::Error { .. }) {
                s.search = SearchState::Idle;
                changed = true;
            }
            changed
        });
    }

    /// Cancel the current search token, optionally installing a fresh one.
    fn replace_search_token(&self, install: bool) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slot = self
            .inner
            .search_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        if install {
            *slot = Some(token.clone());
        }
        token
    }

    async fn run_search(&self, token: CancellationToken, query: String) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.exit_search_mode();
            return;
        }
        if token.is_cancelled() {
            return;
        }

        self.inner.state.send_modify(|s| s.search = SearchState::Searching);
        info!(query = trimmed, "Running search");

        let result = tokio::select! {
            () = token.cancelled() => {
                debug!(query = trimmed, "Search superseded");
                return;
            }
            result = self.inner.feed.search_posts(trimmed) => result,
        };

        self.inner.state.send_if_modified(|s| {
            if token.is_cancelled() || !s.is_search_mode {
                return false;
            }
            s.search = search_outcome(result, &query);
            true
        });
    }
}

fn search_outcome(result: Result<Vec<Post>, FeedError>, query: &str) -> SearchState {
    match result {
        Ok(items) if items.is_empty() => SearchState::Empty {
            query: query.to_string(),
        },
        Ok(items) => SearchState::Results {
            items: items.into(),
            query: query.to_string(),
        },
        Err(e) => SearchState::Error {
            message: e.to_string(),
        },
    }
}

fn apply_first_page(s: &mut FeedState, result: Result<PageResult, FeedError>) {
    match result {
        Ok(page) => {
            s.accumulated = page.items.into();
            s.pagination.current_page = FIRST_PAGE + 1;
            s.pagination.has_more_data = page.has_more;
            s.pagination.error = None;
        }
        Err(e) => {
            warn!(retryable = e.is_retryable(), "Failed to load first page: {e}");
            s.pagination.error = Some(e.to_string());
        }
    }
}

/// Clears `is_refreshing` when a refresh ends, even if its future is dropped.
struct RefreshGuard<'a> {
    state: &'a watch::Sender<FeedState>,
    generation: u64,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| {
            if s.generation == self.generation && s.is_refreshing {
                s.is_refreshing = false;
                true
            } else {
                false
            }
        });
    }
}
