//! Domain values shared by the synchronizer and the controllers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{NewPostRecord, PostRecord};
use crate::remote::PostDto;

/// A feed post. Never mutated in place; use [`Post::with_favourite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub is_favourite: bool,
}

impl Post {
    /// Copy of this post with the favourite flag replaced.
    #[must_use]
    pub fn with_favourite(&self, is_favourite: bool) -> Self {
        Self {
            is_favourite,
            ..self.clone()
        }
    }
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            body: record.body,
            is_favourite: record.is_favourite,
        }
    }
}

impl From<&PostDto> for NewPostRecord {
    fn from(dto: &PostDto) -> Self {
        Self {
            id: dto.id,
            user_id: dto.user_id,
            title: dto.title.clone(),
            body: dto.body.clone(),
        }
    }
}

/// A bounded window of posts at one offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub items: Vec<Post>,
    pub has_more: bool,
    pub total_count: Option<usize>,
    /// Served from the local cache because the remote failed.
    pub from_cache: bool,
}

/// Pagination cursor. At most one of `is_loading`/`is_loading_more` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: usize,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub has_more_data: bool,
    pub error: Option<String>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 0,
            is_loading: false,
            is_loading_more: false,
            has_more_data: true,
            error: None,
        }
    }
}

impl PaginationState {
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.is_loading || self.is_loading_more
    }
}

/// Search lifecycle for the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
    Results { items: Arc<[Post]>, query: String },
    Empty { query: String },
    Error { message: String },
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Success,
    Error(String),
}

/// Read-only view of the login session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_logged_in: bool,
    pub email: Option<String>,
}
