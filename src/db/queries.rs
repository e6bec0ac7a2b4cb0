use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{NewPostRecord, PostRecord, SessionRecord, User};

/// Whether `post` contains the already lowercased `needle` in its title or body.
fn matches_query(post: &PostRecord, needle: &str) -> bool {
    post.title.to_lowercase().contains(needle) || post.body.to_lowercase().contains(needle)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ========== Posts ==========

/// Insert remote posts, merging into any existing rows by id.
///
/// Existing `is_favourite` flags are left untouched; new rows start unflagged.
pub async fn insert_or_merge_posts(pool: &SqlitePool, posts: &[NewPostRecord]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let cached_at = now_millis();
    let mut tx = pool.begin().await.context("Failed to begin merge transaction")?;

    for post in posts {
        sqlx::query(
            r"
            INSERT INTO posts (id, user_id, title, body, is_favourite, cached_at)
            VALUES (?, ?, ?, ?, 0, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                body = excluded.body,
                cached_at = excluded.cached_at
            ",
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(cached_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to merge post {}", post.id))?;
    }

    tx.commit().await.context("Failed to commit merged posts")?;
    Ok(())
}

/// Get one page of cached posts ordered by id.
pub async fn get_posts_page(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<PostRecord>> {
    sqlx::query_as("SELECT * FROM posts ORDER BY id ASC LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch cached posts page")
}

/// Search cached posts whose title or body contains `query`, ignoring case.
///
/// Case folding is Unicode-aware, so it runs here rather than in SQLite `LIKE`.
pub async fn search_posts(pool: &SqlitePool, query: &str) -> Result<Vec<PostRecord>> {
    let needle = query.to_lowercase();
    let posts = get_all_posts(pool)
        .await
        .context("Failed to search cached posts")?;
    Ok(posts
        .into_iter()
        .filter(|post| matches_query(post, &needle))
        .collect())
}

/// Get all favourite posts ordered by id.
pub async fn get_favourite_posts(pool: &SqlitePool) -> Result<Vec<PostRecord>> {
    sqlx::query_as("SELECT * FROM posts WHERE is_favourite = 1 ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to fetch favourite posts")
}

/// Set the favourite flag, returning whether the post exists.
pub async fn set_favourite_status(pool: &SqlitePool, id: i64, is_favourite: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE posts SET is_favourite = ? WHERE id = ?")
        .bind(is_favourite)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update favourite status")?;

    Ok(result.rows_affected() > 0)
}

/// Flip the favourite flag in one statement, returning the new value.
///
/// Returns `None` when the post is not cached.
pub async fn toggle_favourite_status(pool: &SqlitePool, id: i64) -> Result<Option<bool>> {
    let row: Option<(bool,)> = sqlx::query_as(
        "UPDATE posts SET is_favourite = NOT is_favourite WHERE id = ? RETURNING is_favourite",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to toggle favourite status")?;

    Ok(row.map(|(v,)| v))
}

/// Clear every favourite flag, returning how many posts changed.
pub async fn clear_favourites(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("UPDATE posts SET is_favourite = 0 WHERE is_favourite = 1")
        .execute(pool)
        .await
        .context("Failed to clear favourites")?;

    Ok(result.rows_affected())
}

/// Count cached posts.
pub async fn count_posts(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.0)
}

/// Get a cached post by id.
pub async fn get_post_by_id(pool: &SqlitePool, id: i64) -> Result<Option<PostRecord>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by id")
}

/// Get every cached post ordered by id.
pub async fn get_all_posts(pool: &SqlitePool) -> Result<Vec<PostRecord>> {
    sqlx::query_as("SELECT * FROM posts ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to fetch all posts")
}

/// Delete every cached post.
pub async fn clear_all_posts(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM posts")
        .execute(pool)
        .await
        .context("Failed to clear posts")?;
    Ok(result.rows_affected())
}

/// Delete the given posts by id.
pub async fn delete_posts(pool: &SqlitePool, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("DELETE FROM posts WHERE id IN ({placeholders})");
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    let result = query
        .execute(pool)
        .await
        .context("Failed to delete posts")?;
    Ok(result.rows_affected())
}

// ========== Users ==========

/// Insert a new user.
pub async fn insert_user(pool: &SqlitePool, email: &str, password_hash: &str) -> Result<()> {
    sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)")
        .bind(email)
        .bind(password_hash)
        .bind(now_millis())
        .execute(pool)
        .await
        .context("Failed to insert user")?;
    Ok(())
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by email")
}

// ========== Session ==========

/// Read the persisted session, defaulting to logged out.
pub async fn get_session(pool: &SqlitePool) -> Result<SessionRecord> {
    let row: Option<SessionRecord> =
        sqlx::query_as("SELECT is_logged_in, email FROM session WHERE id = 1")
            .fetch_optional(pool)
            .await
            .context("Failed to fetch session")?;
    Ok(row.unwrap_or_default())
}

/// Persist the session state.
pub async fn set_session(pool: &SqlitePool, is_logged_in: bool, email: Option<&str>) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO session (id, is_logged_in, email) VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET is_logged_in = excluded.is_logged_in, email = excluded.email
        ",
    )
    .bind(is_logged_in)
    .bind(email)
    .execute(pool)
    .await
    .context("Failed to store session")?;
    Ok(())
}

/// Remove the persisted session.
pub async fn clear_session(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM session")
        .execute(pool)
        .await
        .context("Failed to clear session")?;
    Ok(())
}
