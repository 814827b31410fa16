//! Debounced user search.
//!
//! Each keystroke restarts the debounce timer; when it fires, the query typed
//! last is submitted. Results are published on a `watch` channel so a UI can
//! re-render on change. A response is applied only if its request is still
//! the latest one submitted.

mod debounce;

pub use debounce::Debouncer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::api::UserDirectory;
use crate::config::Config;
use crate::error::Result;
use crate::models::UserSummary;
use crate::notify::Notifier;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// What the user has typed so far.
    pub query: String,
    /// Results for the last applied search.
    pub results: Vec<UserSummary>,
    pub is_loading: bool,
}

/// Cloning shares the same search.
pub struct UserSearch<D: ?Sized> {
    inner: Arc<Inner<D>>,
}

impl<D: ?Sized> Clone for UserSearch<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<D: ?Sized> {
    directory: Arc<D>,
    limit: usize,
    debouncer: Debouncer,
    typed: Mutex<String>,
    submitted: AtomicU64,
    follow_in_flight: AsyncMutex<()>,
    state: watch::Sender<SearchState>,
    notifier: Notifier,
}

impl<D: UserDirectory + ?Sized + 'static> UserSearch<D> {
    #[must_use]
    pub fn new(directory: Arc<D>, config: &Config, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                directory,
                limit: config.search_limit,
                debouncer: Debouncer::new(config.search_debounce),
                typed: Mutex::new(String::new()),
                submitted: AtomicU64::new(0),
                follow_in_flight: AsyncMutex::new(()),
                state,
                notifier,
            }),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Record a keystroke and restart the debounce timer.
    pub fn on_input(&self, query: impl Into<String>) {
        let query = query.into();
        *self.inner.typed() = query.clone();
        self.inner.state.send_modify(|s| s.query = query);

        let inner = Arc::clone(&self.inner);
        self.inner.debouncer.schedule(async move {
            let query = inner.typed().clone();
            inner.run(query).await;
        });
    }

    /// Search for `query` right away, skipping the debounce.
    pub async fn submit(&self, query: impl Into<String>) {
        let query = query.into();
        self.inner.debouncer.cancel();
        *self.inner.typed() = query.clone();
        self.inner.state.send_modify(|s| s.query = query.clone());
        self.inner.run(query).await;
    }

    /// Update one result's follow flag after a confirmed follow change.
    pub fn set_following(&self, user_id: &str, following: bool) {
        self.inner.state.send_modify(|s| {
            if let Some(user) = s.results.iter_mut().find(|u| u.id == user_id) {
                user.is_following = following;
            }
        });
    }

    /// Follow or unfollow a user shown in the results.
    ///
    /// The flag changes only once the backend confirms, and overlapping
    /// calls run one after another. Returns the new following state.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the result list is then unchanged.
    pub async fn toggle_follow(&self, user_id: &str) -> Result<bool> {
        let _in_flight = self.inner.follow_in_flight.lock().await;
        let following = self
            .inner
            .state
            .borrow()
            .results
            .iter()
            .find(|u| u.id == user_id)
            .is_some_and(|u| u.is_following);

        let result = if following {
            self.inner.directory.unfollow(user_id).await
        } else {
            self.inner.directory.follow(user_id).await
        };

        match result {
            Ok(()) => {
                self.set_following(user_id, !following);
                self.inner.notifier.success(if following {
                    "Unfollowed successfully"
                } else {
                    "Followed successfully"
                });
                Ok(!following)
            }
            Err(e) => {
                warn!(user_id = %user_id, "Follow change failed: {e}");
                self.inner.notifier.error("Failed to update follow status");
                Err(e)
            }
        }
    }
}

impl<D: UserDirectory + ?Sized> Inner<D> {
    fn typed(&self) -> std::sync::MutexGuard<'_, String> {
        self.typed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, query: String) {
        // Every run supersedes earlier requests, a cleared box included.
        let request = self.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.state.send_modify(|s| {
                s.results.clear();
                s.is_loading = false;
            });
            return;
        }

        self.state.send_modify(|s| s.is_loading = true);
        debug!(query = %trimmed, request, "Searching users");

        let result = self.directory.search_users(trimmed, self.limit, 0).await;

        if self.submitted.load(Ordering::Acquire) != request {
            debug!(query = %trimmed, request, "Discarding stale search response");
            return;
        }

        match result {
            Ok(users) => {
                info!(query = %trimmed, count = users.len(), "User search complete");
                self.state.send_modify(|s| {
                    s.results = users;
                    s.is_loading = false;
                });
            }
            Err(e) => {
                warn!(query = %trimmed, "User search failed: {e}");
                self.notifier.error("Failed to search users");
                self.state.send_modify(|s| s.is_loading = false);
            }
        }
    }
}
