use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::comments::CommentThread;
use super::page::{LoadGate, LoadMode, PageBuffer};
use crate::api::{FeedBackend, FeedScope};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{CommentRecord, MemeRecord, MemeUpdate};
use crate::notify::Notifier;

/// Read-only view of a feed for rendering.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub items: Vec<MemeRecord>,
    pub cursor: usize,
    pub has_more: bool,
    pub is_loading: bool,
}

/// What a `load_page` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Another load for this feed was in flight; nothing was requested.
    AlreadyLoading,
    /// An append was requested after the last page; nothing was requested.
    Exhausted,
    Loaded { added: usize, has_more: bool },
}

/// A deduplicated, paginated feed with optimistic likes and comment previews.
///
/// State sits behind a mutex that is never held across a network call, so a
/// shared synchronizer can serve concurrent callers. Separate instances share
/// nothing.
pub struct FeedSynchronizer<B: ?Sized> {
    backend: Arc<B>,
    scope: FeedScope,
    page_size: usize,
    preview_size: usize,
    comment_page_size: usize,
    pages: Mutex<PageBuffer<MemeRecord>>,
    /// Latest like toggle per meme. Only locked while `pages` is held.
    like_toggles: Mutex<HashMap<String, u64>>,
    gate: LoadGate,
    notifier: Notifier,
}

impl<B: FeedBackend + ?Sized> FeedSynchronizer<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, scope: FeedScope, config: &Config, notifier: Notifier) -> Self {
        Self {
            backend,
            scope,
            page_size: config.page_size,
            preview_size: config.comment_preview_size,
            comment_page_size: config.comment_page_size,
            pages: Mutex::new(PageBuffer::new()),
            like_toggles: Mutex::new(HashMap::new()),
            gate: LoadGate::default(),
            notifier,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedState {
        let pages = self.pages();
        FeedState {
            items: pages.items().to_vec(),
            cursor: pages.cursor(),
            has_more: pages.has_more(),
            is_loading: self.gate.is_loading(),
        }
    }

    #[must_use]
    pub fn get(&self, meme_id: &str) -> Option<MemeRecord> {
        self.pages().get(meme_id).cloned()
    }

    /// Open the full comment list of a meme, sharing this feed's backend.
    #[must_use]
    pub fn comment_thread(&self, meme_id: &str) -> CommentThread<B> {
        CommentThread::new(
            Arc::clone(&self.backend),
            meme_id,
            self.comment_page_size,
            self.notifier.clone(),
        )
    }

    /// Fetch one page and merge it.
    ///
    /// A call made while another load is in flight returns immediately. On
    /// failure the held items and cursor are untouched.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn load_page(&self, mode: LoadMode) -> Result<LoadOutcome> {
        let Some(_ticket) = self.gate.try_begin() else {
            debug!(scope = ?self.scope, "Load already in flight, skipping");
            return Ok(LoadOutcome::AlreadyLoading);
        };

        let offset = {
            let pages = self.pages();
            if mode == LoadMode::Append && !pages.has_more() {
                return Ok(LoadOutcome::Exhausted);
            }
            pages.next_offset(mode)
        };

        debug!(scope = ?self.scope, ?mode, offset, limit = self.page_size, "Fetching feed page");
        match self
            .backend
            .fetch_memes(&self.scope, self.page_size, offset)
            .await
        {
            Ok(page) => {
                let mut pages = self.pages();
                let fetched = page.len();
                let added = pages.apply_page(mode, page, self.page_size);
                let has_more = pages.has_more();
                info!(
                    scope = ?self.scope,
                    fetched,
                    added,
                    total = pages.items().len(),
                    has_more,
                    "Feed page merged"
                );
                Ok(LoadOutcome::Loaded { added, has_more })
            }
            Err(e) => {
                warn!(scope = ?self.scope, offset, "Failed to load feed page: {e}");
                self.notifier.error("Failed to load memes");
                Err(e)
            }
        }
    }

    /// Start over from the first page, discarding what is held.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        self.load_page(LoadMode::Reset).await
    }

    /// # Errors
    ///
    /// Returns the backend error if the fetch fails.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        self.load_page(LoadMode::Append).await
    }

    /// Flip the viewer's like on a meme, then confirm with the backend.
    ///
    /// The flag and the count change together by exactly one. If the backend
    /// rejects the change it is reverted, unless a later toggle of the same
    /// meme has been issued since. Returns the liked state the server
    /// confirmed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeme` if the meme is not held, otherwise the backend
    /// error.
    pub async fn toggle_like(&self, meme_id: &str) -> Result<bool> {
        let (liked, toggle) = {
            let mut pages = self.pages();
            let meme = pages
                .get_mut(meme_id)
                .ok_or_else(|| Error::UnknownMeme(meme_id.to_string()))?;
            let target = !meme.liked_by_current_viewer;
            set_liked(meme, target);
            let mut toggles = self.like_toggles();
            let latest = toggles.entry(meme_id.to_string()).or_insert(0);
            *latest += 1;
            (target, *latest)
        };

        let result = if liked {
            self.backend.like(meme_id).await
        } else {
            self.backend.unlike(meme_id).await
        };

        match result {
            Ok(()) => {
                debug!(meme_id = %meme_id, liked, "Like confirmed");
                Ok(liked)
            }
            Err(e) => {
                let mut pages = self.pages();
                let superseded = self.like_toggles().get(meme_id) != Some(&toggle);
                if !superseded {
                    // A reload may already have replaced the optimistic copy.
                    if let Some(meme) = pages
                        .get_mut(meme_id)
                        .filter(|m| m.liked_by_current_viewer == liked)
                    {
                        set_liked(meme, !liked);
                    }
                }
                warn!(meme_id = %meme_id, liked, superseded, "Like request failed: {e}");
                self.notifier.error("Failed to update like");
                Err(e)
            }
        }
    }

    /// Post a comment and show it at the top of the meme's preview.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank text (nothing is sent), `UnknownMeme`
    /// if the meme is not held, otherwise the backend error.
    pub async fn add_comment(&self, meme_id: &str, text: &str) -> Result<CommentRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Comment text is required".to_string()));
        }
        if !self.pages().contains(meme_id) {
            return Err(Error::UnknownMeme(meme_id.to_string()));
        }

        let comment = match self.backend.add_comment(meme_id, text).await {
            Ok(comment) => comment,
            Err(e) => {
                warn!(meme_id = %meme_id, "Failed to add comment: {e}");
                self.notifier.error("Failed to add comment");
                return Err(e);
            }
        };

        let mut pages = self.pages();
        if let Some(meme) = pages.get_mut(meme_id) {
            meme.recent_comments.insert(0, comment.clone());
            meme.recent_comments.truncate(self.preview_size);
            meme.comments_count = meme.comments_count.saturating_add(1);
        }
        debug!(meme_id = %meme_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Delete a comment and drop it from whichever preview holds it.
    ///
    /// Returns whether a held meme's preview contained the comment.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is then unchanged.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<bool> {
        if let Err(e) = self.backend.delete_comment(comment_id).await {
            warn!(comment_id = %comment_id, "Failed to delete comment: {e}");
            self.notifier.error("Failed to delete comment");
            return Err(e);
        }

        let mut pages = self.pages();
        for meme in pages.iter_mut() {
            if let Some(index) = meme.recent_comments.iter().position(|c| c.id == comment_id) {
                meme.recent_comments.remove(index);
                meme.comments_count = meme.comments_count.saturating_sub(1);
                debug!(comment_id = %comment_id, meme_id = %meme.id, "Comment removed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete one of the viewer's memes and drop it from the feed.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is then unchanged.
    pub async fn delete_meme(&self, meme_id: &str) -> Result<()> {
        if let Err(e) = self.backend.delete_meme(meme_id).await {
            warn!(meme_id = %meme_id, "Failed to delete meme: {e}");
            self.notifier.error("Failed to delete meme");
            return Err(e);
        }
        self.pages().remove(meme_id);
        info!(meme_id = %meme_id, "Meme deleted");
        Ok(())
    }

    /// Change a meme's caption to the value the server stores.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is then unchanged.
    pub async fn update_caption(&self, meme_id: &str, caption: &str) -> Result<()> {
        let update = MemeUpdate {
            caption: caption.to_string(),
        };
        let updated = match self.backend.update_meme(meme_id, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(meme_id = %meme_id, "Failed to update meme: {e}");
                self.notifier.error("Failed to update meme");
                return Err(e);
            }
        };
        if let Some(meme) = self.pages().get_mut(meme_id) {
            meme.caption = updated.caption;
        }
        Ok(())
    }

    fn pages(&self) -> MutexGuard<'_, PageBuffer<MemeRecord>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn like_toggles(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.like_toggles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Move a record to `liked`, keeping the count in step.
fn set_liked(meme: &mut MemeRecord, liked: bool) {
    if meme.liked_by_current_viewer == liked {
        return;
    }
    meme.liked_by_current_viewer = liked;
    meme.likes_count = if liked {
        meme.likes_count.saturating_add(1)
    } else {
        meme.likes_count.saturating_sub(1)
    };
}
