//! Feed synchronization core.
//!
//! Reconciles a remote paged posts API with a local SQLite cache, serving
//! pages remote-first with cache fallback, incremental "load more"
//! pagination, debounced search over cached posts, and a favourites flag
//! kept consistent across paginated and searched views.

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod favourites;
pub mod feed;
pub mod model;
pub mod remote;
pub mod sync;
