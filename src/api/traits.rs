use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CommentRecord, MemeRecord, MemeUpdate, UserProfile, UserSummary};

/// Which slice of the meme collection a feed shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedScope {
    /// The viewer's home feed: their own memes plus those of followed users.
    Global,
    /// Memes authored by a single user.
    User(String),
}

/// Meme endpoints the synchronizers depend on.
///
/// `ApiClient` is the production implementation; tests substitute in-memory
/// fakes.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    /// Fetch at most `limit` memes starting at offset `skip`, in server order.
    async fn fetch_memes(
        &self,
        scope: &FeedScope,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<MemeRecord>>;

    async fn like(&self, meme_id: &str) -> Result<()>;

    async fn unlike(&self, meme_id: &str) -> Result<()>;

    /// Fetch comments on a meme, newest first.
    async fn fetch_comments(
        &self,
        meme_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<CommentRecord>>;

    /// Create a comment and return the stored record.
    async fn add_comment(&self, meme_id: &str, text: &str) -> Result<CommentRecord>;

    async fn delete_comment(&self, comment_id: &str) -> Result<()>;

    /// Apply an edit and return the server's copy of the meme.
    async fn update_meme(&self, meme_id: &str, update: &MemeUpdate) -> Result<MemeRecord>;

    async fn delete_meme(&self, meme_id: &str) -> Result<()>;
}

/// User endpoints used by search and profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn search_users(&self, query: &str, limit: usize, skip: usize)
        -> Result<Vec<UserSummary>>;

    async fn get_user(&self, user_id: &str) -> Result<UserProfile>;

    async fn follow(&self, user_id: &str) -> Result<()>;

    async fn unfollow(&self, user_id: &str) -> Result<()>;

    async fn followers(&self, user_id: &str, limit: usize, skip: usize)
        -> Result<Vec<UserSummary>>;

    async fn following(&self, user_id: &str, limit: usize, skip: usize)
        -> Result<Vec<UserSummary>>;
}
