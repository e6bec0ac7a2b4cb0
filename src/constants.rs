//! Shared constants used across the application.

use std::time::Duration;

/// User agent string sent with every remote page request.
pub const USER_AGENT: &str = "feedsync/0.1";

/// Base URL of the public posts API.
pub const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com/";

/// Number of posts requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Size of the remote corpus when the API does not report a total.
pub const TOTAL_POSTS: usize = 100;

/// Index of the first page.
pub const FIRST_PAGE: usize = 0;

/// Quiet period a query must survive before a search runs.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Minimum accepted password length for registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;
