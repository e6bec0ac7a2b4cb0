//! Paginated, searchable feed state machine.

mod controller;

pub use controller::FeedController;

use std::sync::Arc;

use crate::model::{PaginationState, Post, SearchState};

/// Phase of the feed, derived from [`FeedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Idle,
    Loading,
    LoadingMore,
    Refreshing,
    Error,
    Search,
}

/// Snapshot published to subscribers. Replaced wholesale on every mutation.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    /// Posts gathered by pagination. Kept intact while search mode is active.
    pub accumulated: Arc<[Post]>,
    pub pagination: PaginationState,
    pub is_refreshing: bool,
    pub is_search_mode: bool,
    pub search: SearchState,
    pub query: String,
    /// Bumped by mode switches and refreshes; fetches started under an older
    /// generation are discarded on completion.
    pub generation: u64,
}

impl FeedState {
    /// Posts currently on display: the accumulated list outside search mode.
    ///
    /// In search mode only a completed search with matches shows anything.
    #[must_use]
    pub fn posts(&self) -> &[Post] {
        if !self.is_search_mode {
            return &self.accumulated;
        }
        match &self.search {
            SearchState::Results { items, .. } => items,
            SearchState::Idle
            | SearchState::Searching
            | SearchState::Empty { .. }
            | SearchState::Error { .. } => &[],
        }
    }

    #[must_use]
    pub fn mode(&self) -> FeedMode {
        if self.is_search_mode {
            FeedMode::Search
        } else if self.is_refreshing {
            FeedMode::Refreshing
        } else if self.pagination.is_loading {
            FeedMode::Loading
        } else if self.pagination.is_loading_more {
            FeedMode::LoadingMore
        } else if self.pagination.error.is_some() {
            FeedMode::Error
        } else {
            FeedMode::Idle
        }
    }

    /// Invalidate in-flight pagination work and release its flags.
    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pagination.is_loading = false;
        self.pagination.is_loading_more = false;
        self.is_refreshing = false;
    }
}

/// Replace the favourite flag of `post_id` in `posts`, returning a new list.
fn with_favourite(posts: &[Post], post_id: i64, is_favourite: bool) -> Arc<[Post]> {
    posts
        .iter()
        .map(|p| {
            if p.id == post_id {
                p.with_favourite(is_favourite)
            } else {
                p.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64) -> Post {
        Post {
            id,
            user_id: 1,
            title: format!("title {id}"),
            body: format!("body {id}"),
            is_favourite: false,
        }
    }

    #[test]
    fn test_posts_follow_mode() {
        let accumulated: Arc<[Post]> = vec![post(1), post(2)].into();
        let mut state = FeedState {
            accumulated: accumulated.clone(),
            ..FeedState::default()
        };
        assert_eq!(state.posts().len(), 2);

        state.is_search_mode = true;
        state.search = SearchState::Results {
            items: vec![post(2)].into(),
            query: "2".to_string(),
        };
        assert_eq!(state.posts(), &[post(2)]);

        state.search = SearchState::Empty {
            query: "zzz".to_string(),
        };
        assert!(state.posts().is_empty());
        assert_eq!(state.mode(), FeedMode::Search);
    }

    #[test]
    fn test_search_mode_hides_accumulated_until_results() {
        let mut state = FeedState {
            accumulated: vec![post(1), post(2)].into(),
            is_search_mode: true,
            ..FeedState::default()
        };
        assert!(state.posts().is_empty());

        state.search = SearchState::Searching;
        assert!(state.posts().is_empty());

        state.search = SearchState::Error {
            message: "offline".to_string(),
        };
        assert!(state.posts().is_empty());
        assert_eq!(state.accumulated.len(), 2);
    }

    #[test]
    fn test_mode_precedence() {
        let mut state = FeedState::default();
        assert_eq!(state.mode(), FeedMode::Idle);
        state.pagination.error = Some("boom".to_string());
        assert_eq!(state.mode(), FeedMode::Error);
        state.pagination.is_loading_more = true;
        assert_eq!(state.mode(), FeedMode::LoadingMore);
        state.is_refreshing = true;
        assert_eq!(state.mode(), FeedMode::Refreshing);
    }

    #[test]
    fn test_bump_generation_releases_flags() {
        let mut state = FeedState::default();
        state.pagination.is_loading_more = true;
        state.is_refreshing = true;
        state.bump_generation();
        assert_eq!(state.generation, 1);
        assert!(!state.pagination.is_busy());
        assert!(!state.is_refreshing);
    }

    #[test]
    fn test_with_favourite_copies() {
        let original: Arc<[Post]> = vec![post(1), post(2)].into();
        let updated = with_favourite(&original, 2, true);
        assert!(!original[1].is_favourite);
        assert!(updated[1].is_favourite);
        assert!(!updated[0].is_favourite);
    }
}
