//! Feed controller behaviour against an in-memory feed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedsync::error::{FavouriteError, FeedError};
use feedsync::feed::{FeedController, FeedMode};
use feedsync::model::{PageResult, Post, SearchState};
use feedsync::sync::PostFeed;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::time::sleep;

const PAGE_SIZE: usize = 10;
const DEBOUNCE: Duration = Duration::from_millis(300);

/// Thirty posts served ten at a time, with call recording.
struct FakeFeed {
    corpus: Vec<Post>,
    favourites: Mutex<HashSet<i64>>,
    failing: AtomicBool,
    page_delay: Mutex<Duration>,
    page_calls: Mutex<Vec<(usize, bool)>>,
    searches: Mutex<Vec<String>>,
}

impl FakeFeed {
    fn new() -> Arc<Self> {
        let corpus = (1..=30)
            .map(|id| Post {
                id,
                user_id: 1,
                title: format!("post title {id}"),
                body: format!("post body {id}"),
                is_favourite: false,
            })
            .collect();
        Arc::new(Self {
            corpus,
            favourites: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
            page_delay: Mutex::new(Duration::ZERO),
            page_calls: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn set_page_delay(&self, delay: Duration) {
        *self.page_delay.lock().unwrap() = delay;
    }

    fn page_calls(&self) -> Vec<(usize, bool)> {
        self.page_calls.lock().unwrap().clone()
    }

    fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    fn flagged(&self, post: &Post) -> Post {
        post.with_favourite(self.favourites.lock().unwrap().contains(&post.id))
    }
}

#[async_trait]
impl PostFeed for FakeFeed {
    async fn get_page(&self, page: usize, force_refresh: bool) -> Result<PageResult, FeedError> {
        self.page_calls.lock().unwrap().push((page, force_refresh));
        let delay = *self.page_delay.lock().unwrap();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Network("offline".to_string()));
        }

        let start = (page * PAGE_SIZE).min(self.corpus.len());
        let end = (start + PAGE_SIZE).min(self.corpus.len());
        Ok(PageResult {
            items: self.corpus[start..end].iter().map(|p| self.flagged(p)).collect(),
            has_more: end < self.corpus.len(),
            total_count: Some(self.corpus.len()),
            from_cache: false,
        })
    }

    async fn toggle_favourite(&self, post_id: i64) -> Result<bool, FavouriteError> {
        if !self.corpus.iter().any(|p| p.id == post_id) {
            return Err(FavouriteError::NotFound(post_id));
        }
        let mut favourites = self.favourites.lock().unwrap();
        if favourites.remove(&post_id) {
            Ok(false)
        } else {
            favourites.insert(post_id);
            Ok(true)
        }
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>, FeedError> {
        self.searches.lock().unwrap().push(query.to_string());
        let needle = query.to_lowercase();
        Ok(self
            .corpus
            .iter()
            .filter(|p| p.title.contains(&needle) || p.body.contains(&needle))
            .map(|p| self.flagged(p))
            .collect())
    }

    fn favourite_posts(&self) -> BoxStream<'static, Result<Vec<Post>, FeedError>> {
        stream::empty().boxed()
    }

    async fn remove_favourite(&self, post_id: i64) -> Result<(), FavouriteError> {
        self.favourites.lock().unwrap().remove(&post_id);
        Ok(())
    }

    async fn clear_favourites(&self) -> Result<u64, FavouriteError> {
        let mut favourites = self.favourites.lock().unwrap();
        let cleared = favourites.len() as u64;
        favourites.clear();
        Ok(cleared)
    }
}

fn ids(posts: &[Post]) -> Vec<i64> {
    posts.iter().map(|p| p.id).collect()
}

#[tokio::test(start_paused = true)]
async fn test_first_page_load() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);

    controller.load_first_page().await;

    let state = controller.state();
    assert_eq!(ids(state.posts()), (1..=10).collect::<Vec<_>>());
    assert_eq!(state.pagination.current_page, 1);
    assert!(state.pagination.has_more_data);
    assert_eq!(state.mode(), FeedMode::Idle);
    assert_eq!(feed.page_calls(), vec![(0, false)]);
}

#[tokio::test(start_paused = true)]
async fn test_start_loads_in_background() {
    let feed = FakeFeed::new();
    let controller = FeedController::start(feed.clone(), DEBOUNCE);
    let mut updates = controller.subscribe();

    updates
        .wait_for(|s| !s.accumulated.is_empty())
        .await
        .expect("controller dropped");
    assert_eq!(controller.state().posts().len(), PAGE_SIZE);
}

#[tokio::test(start_paused = true)]
async fn test_next_pages_append_until_exhausted() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);

    controller.load_first_page().await;
    controller.load_next_page().await;
    let state = controller.state();
    assert_eq!(ids(state.posts()), (1..=20).collect::<Vec<_>>());
    assert_eq!(state.pagination.current_page, 2);

    controller.load_next_page().await;
    let state = controller.state();
    assert_eq!(state.posts().len(), 30);
    assert!(!state.pagination.has_more_data);

    // Exhausted: no further requests.
    controller.load_next_page().await;
    assert_eq!(feed.page_calls().len(), 3);
    assert_eq!(controller.state().posts().len(), 30);
}

#[tokio::test(start_paused = true)]
async fn test_failed_next_page_keeps_list() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    feed.set_failing(true);
    controller.load_next_page().await;

    let state = controller.state();
    assert_eq!(state.posts().len(), PAGE_SIZE);
    assert_eq!(state.pagination.current_page, 1);
    assert!(state
        .pagination
        .error
        .as_deref()
        .is_some_and(|e| e.contains("offline")));
    assert_eq!(state.mode(), FeedMode::Error);

    controller.clear_error();
    assert!(controller.state().pagination.error.is_none());

    // Retrying the same page succeeds once the remote recovers.
    feed.set_failing(false);
    controller.load_next_page().await;
    assert_eq!(controller.state().posts().len(), 20);
    assert_eq!(feed.page_calls(), vec![(0, false), (1, false), (1, false)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_page_shows_error() {
    let feed = FakeFeed::new();
    feed.set_failing(true);
    let controller = FeedController::new(feed.clone(), DEBOUNCE);

    controller.load_first_page().await;

    let state = controller.state();
    assert!(state.posts().is_empty());
    assert!(state.pagination.error.is_some());
    assert!(!state.pagination.is_loading);
    assert_eq!(state.mode(), FeedMode::Error);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_runs_only_last_query() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("a");
    sleep(Duration::from_millis(100)).await;
    controller.on_query_changed("ab");
    sleep(Duration::from_millis(100)).await;
    controller.on_query_changed("abc");
    assert!(feed.searches().is_empty());

    sleep(DEBOUNCE * 2).await;

    assert_eq!(feed.searches(), vec!["abc".to_string()]);
    let state = controller.state();
    assert_eq!(state.mode(), FeedMode::Search);
    assert_eq!(state.query, "abc");
    assert!(matches!(state.search, SearchState::Empty { ref query } if query == "abc"));
    assert!(state.posts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pending_search_hides_paginated_list() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title 3");
    let state = controller.state();
    assert!(state.is_search_mode);
    assert!(state.posts().is_empty());
    assert_eq!(state.accumulated.len(), PAGE_SIZE);

    sleep(DEBOUNCE * 2).await;
    assert!(!controller.state().posts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_search_results_replace_displayed_posts() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title 2");
    sleep(DEBOUNCE * 2).await;

    let state = controller.state();
    // Search covers the whole corpus, not just the loaded page.
    assert_eq!(ids(state.posts()), vec![2, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29]);
    assert_eq!(state.accumulated.len(), PAGE_SIZE);
}

#[tokio::test(start_paused = true)]
async fn test_blank_query_exits_search_mode() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title 1");
    sleep(DEBOUNCE * 2).await;
    assert!(controller.state().is_search_mode);

    controller.on_query_changed("   ");
    let state = controller.state();
    assert!(!state.is_search_mode);
    assert_eq!(state.search, SearchState::Idle);
    assert!(state.query.is_empty());
    assert_eq!(ids(state.posts()), (1..=10).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_exit_cancels_pending_search() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);

    controller.on_query_changed("title");
    controller.exit_search_mode();
    sleep(DEBOUNCE * 2).await;

    assert!(feed.searches().is_empty());
    assert!(!controller.state().is_search_mode);
}

#[tokio::test(start_paused = true)]
async fn test_search_mode_blocks_pagination() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title");
    controller.load_next_page().await;

    assert_eq!(feed.page_calls().len(), 1);
    assert_eq!(controller.state().pagination.current_page, 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_arriving_after_search_is_discarded() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    feed.set_page_delay(Duration::from_secs(1));
    let background = controller.clone();
    let pending = tokio::spawn(async move { background.load_next_page().await });
    sleep(Duration::from_millis(10)).await;
    assert!(controller.state().pagination.is_loading_more);

    controller.on_query_changed("title 3");
    pending.await.unwrap();

    let state = controller.state();
    assert_eq!(state.accumulated.len(), PAGE_SIZE);
    assert_eq!(state.pagination.current_page, 1);
    assert!(!state.pagination.is_loading_more);

    controller.exit_search_mode();
    assert_eq!(ids(controller.state().posts()), (1..=10).collect::<Vec<_>>());

    // Pagination resumes from where it was.
    feed.set_page_delay(Duration::ZERO);
    controller.load_next_page().await;
    assert_eq!(controller.state().posts().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_accumulated_list() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;
    controller.load_next_page().await;
    assert_eq!(controller.state().posts().len(), 20);

    controller.refresh().await;

    let state = controller.state();
    assert_eq!(ids(state.posts()), (1..=10).collect::<Vec<_>>());
    assert_eq!(state.pagination.current_page, 1);
    assert!(!state.is_refreshing);
    assert_eq!(feed.page_calls().last(), Some(&(0, true)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_list() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    feed.set_failing(true);
    controller.refresh().await;

    let state = controller.state();
    assert_eq!(state.posts().len(), PAGE_SIZE);
    assert!(state.pagination.error.is_some());
    assert!(!state.is_refreshing);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_in_search_mode_reruns_search() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title 1");
    sleep(DEBOUNCE * 2).await;
    assert_eq!(feed.searches().len(), 1);

    controller.refresh().await;

    assert_eq!(feed.searches(), vec!["title 1".to_string(), "title 1".to_string()]);
    assert_eq!(feed.page_calls().len(), 1);
    assert!(matches!(controller.state().search, SearchState::Results { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_updates_list_and_search_results() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    controller.on_query_changed("title 3");
    sleep(DEBOUNCE * 2).await;

    let target = controller
        .state()
        .posts()
        .iter()
        .find(|p| p.id == 3)
        .cloned()
        .unwrap();
    assert!(controller.toggle_favourite(&target).await.unwrap());

    let state = controller.state();
    assert!(state.posts().iter().any(|p| p.id == 3 && p.is_favourite));
    assert!(state.accumulated.iter().any(|p| p.id == 3 && p.is_favourite));
    assert_eq!(state.accumulated.iter().filter(|p| p.is_favourite).count(), 1);

    assert!(!controller.toggle_favourite(&target).await.unwrap());
    assert!(controller.state().accumulated.iter().all(|p| !p.is_favourite));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_unknown_post_reports_error() {
    let feed = FakeFeed::new();
    let controller = FeedController::new(feed.clone(), DEBOUNCE);
    controller.load_first_page().await;

    let ghost = Post {
        id: 404,
        user_id: 1,
        title: "ghost".to_string(),
        body: String::new(),
        is_favourite: false,
    };
    assert_eq!(
        controller.toggle_favourite(&ghost).await,
        Err(FavouriteError::NotFound(404))
    );

    let state = controller.state();
    assert!(state.pagination.error.is_some());
    assert_eq!(state.posts().len(), PAGE_SIZE);
}
