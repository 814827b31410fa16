//! Shared constants used across the client.

/// User agent sent with every API request.
pub const CLIENT_USER_AGENT: &str = concat!("meme-feed-client/", env!("CARGO_PKG_VERSION"));

/// Records requested per feed page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Comments requested per page of an expanded comment thread.
pub const DEFAULT_COMMENT_PAGE_SIZE: usize = 10;

/// Number of comments kept inline on a feed card (newest first).
pub const DEFAULT_COMMENT_PREVIEW_SIZE: usize = 2;

/// Quiet period before a typed search query is submitted.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

/// Maximum users returned per search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
