use serde::{Deserialize, Serialize};

/// A post as cached in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub is_favourite: bool,
    /// Epoch milliseconds of the last write from the remote.
    pub cached_at: i64,
}

/// Remote-sourced fields of a post, ready to merge into the store.
///
/// Carries no favourite flag: merging never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

/// A registered local account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// Persisted login session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub is_logged_in: bool,
    pub email: Option<String>,
}
