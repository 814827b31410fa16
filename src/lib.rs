//! Meme feed client library.
//!
//! Keeps a paginated, deduplicated meme feed in sync with the backend,
//! applies likes optimistically, posts comments, and runs a debounced user
//! search.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod profile;
pub mod search;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, FeedBackend, FeedScope, UserDirectory};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{CommentThread, FeedState, FeedSynchronizer, LoadMode, LoadOutcome};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use profile::ProfileView;
pub use search::{SearchState, UserSearch};
pub use session::Session;
