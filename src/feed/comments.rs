//! The expanded comment list under a single meme.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::page::{LoadGate, LoadMode, PageBuffer};
use super::synchronizer::LoadOutcome;
use crate::api::FeedBackend;
use crate::error::{Error, Result};
use crate::models::CommentRecord;
use crate::notify::Notifier;

/// Paginated comments for one meme, newest first.
///
/// Follows the same rules as the feed: one load at a time, duplicates by id
/// dropped, a short page ends pagination, failures change nothing.
pub struct CommentThread<B: ?Sized> {
    backend: Arc<B>,
    meme_id: String,
    page_size: usize,
    pages: Mutex<PageBuffer<CommentRecord>>,
    gate: LoadGate,
    notifier: Notifier,
}

impl<B: FeedBackend + ?Sized> CommentThread<B> {
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        meme_id: impl Into<String>,
        page_size: usize,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            meme_id: meme_id.into(),
            page_size,
            pages: Mutex::new(PageBuffer::new()),
            gate: LoadGate::default(),
            notifier,
        }
    }

    #[must_use]
    pub fn meme_id(&self) -> &str {
        &self.meme_id
    }

    #[must_use]
    pub fn comments(&self) -> Vec<CommentRecord> {
        self.pages().items().to_vec()
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.pages().has_more()
    }

    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn load(&self, mode: LoadMode) -> Result<LoadOutcome> {
        let Some(_ticket) = self.gate.try_begin() else {
            return Ok(LoadOutcome::AlreadyLoading);
        };
        let offset = {
            let pages = self.pages();
            if mode == LoadMode::Append && !pages.has_more() {
                return Ok(LoadOutcome::Exhausted);
            }
            pages.next_offset(mode)
        };

        match self
            .backend
            .fetch_comments(&self.meme_id, self.page_size, offset)
            .await
        {
            Ok(page) => {
                let mut pages = self.pages();
                let added = pages.apply_page(mode, page, self.page_size);
                debug!(meme_id = %self.meme_id, added, "Comment page merged");
                Ok(LoadOutcome::Loaded {
                    added,
                    has_more: pages.has_more(),
                })
            }
            Err(e) => {
                warn!(meme_id = %self.meme_id, offset, "Failed to load comments: {e}");
                self.notifier.error("Failed to load comments");
                Err(e)
            }
        }
    }

    /// Post a comment and put it at the top of the thread.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank text (nothing is sent), otherwise the
    /// backend error.
    pub async fn add(&self, text: &str) -> Result<CommentRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Comment text is required".to_string()));
        }
        match self.backend.add_comment(&self.meme_id, text).await {
            Ok(comment) => {
                self.pages().prepend(comment.clone());
                Ok(comment)
            }
            Err(e) => {
                warn!(meme_id = %self.meme_id, "Failed to add comment: {e}");
                self.notifier.error("Failed to add comment");
                Err(e)
            }
        }
    }

    /// Delete a comment and drop it from the thread.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the thread is then unchanged.
    pub async fn delete(&self, comment_id: &str) -> Result<()> {
        if let Err(e) = self.backend.delete_comment(comment_id).await {
            warn!(comment_id = %comment_id, "Failed to delete comment: {e}");
            self.notifier.error("Failed to delete comment");
            return Err(e);
        }
        self.pages().remove(comment_id);
        Ok(())
    }

    fn pages(&self) -> MutexGuard<'_, PageBuffer<CommentRecord>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
