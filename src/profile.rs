//! A single user's profile page: their details, memes, and follow state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::api::{FeedBackend, FeedScope, UserDirectory};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::FeedSynchronizer;
use crate::models::{UserProfile, UserSummary};
use crate::notify::Notifier;

pub struct ProfileView<B: ?Sized, D: ?Sized> {
    directory: Arc<D>,
    user_id: String,
    viewer_id: Option<String>,
    profile: Mutex<Option<UserProfile>>,
    /// Held for the whole of a follow change so overlapping toggles queue.
    follow_in_flight: AsyncMutex<()>,
    memes: FeedSynchronizer<B>,
    notifier: Notifier,
}

impl<B, D> ProfileView<B, D>
where
    B: FeedBackend + ?Sized,
    D: UserDirectory + ?Sized,
{
    /// `viewer_id` is the signed-in user, if known; it blocks self-follows.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        directory: Arc<D>,
        user_id: impl Into<String>,
        viewer_id: Option<String>,
        config: &Config,
        notifier: Notifier,
    ) -> Self {
        let user_id = user_id.into();
        let memes = FeedSynchronizer::new(
            backend,
            FeedScope::User(user_id.clone()),
            config,
            notifier.clone(),
        );
        Self {
            directory,
            user_id,
            viewer_id,
            profile: Mutex::new(None),
            follow_in_flight: AsyncMutex::new(()),
            memes,
            notifier,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The last loaded profile.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile_slot().clone()
    }

    /// The user's own memes.
    #[must_use]
    pub fn memes(&self) -> &FeedSynchronizer<B> {
        &self.memes
    }

    #[must_use]
    pub fn is_own_profile(&self) -> bool {
        self.viewer_id.as_deref() == Some(self.user_id.as_str())
    }

    /// # Errors
    ///
    /// Returns the backend error; a previously loaded profile is kept.
    pub async fn load(&self) -> Result<UserProfile> {
        match self.directory.get_user(&self.user_id).await {
            Ok(profile) => {
                *self.profile_slot() = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                warn!(user_id = %self.user_id, "Failed to load profile: {e}");
                self.notifier.error("Failed to load profile");
                Err(e)
            }
        }
    }

    /// Follow or unfollow this user. Returns the new following state.
    ///
    /// Local state changes only after the backend confirms. Overlapping calls
    /// run one after another, each seeing the state the previous one left.
    ///
    /// # Errors
    ///
    /// - `Validation` when the viewer is this user (nothing is sent)
    /// - `Validation` when the profile has not been loaded
    /// - the backend error otherwise
    pub async fn toggle_follow(&self) -> Result<bool> {
        if self.is_own_profile() {
            return Err(Error::Validation("You cannot follow yourself".to_string()));
        }
        let _in_flight = self.follow_in_flight.lock().await;
        let following = self
            .profile_slot()
            .as_ref()
            .map(|p| p.summary.is_following)
            .ok_or_else(|| Error::Validation("Profile not loaded".to_string()))?;

        let result = if following {
            self.directory.unfollow(&self.user_id).await
        } else {
            self.directory.follow(&self.user_id).await
        };
        if let Err(e) = result {
            warn!(user_id = %self.user_id, "Follow change failed: {e}");
            self.notifier.error("Failed to update follow status");
            return Err(e);
        }

        if let Some(profile) = self.profile_slot().as_mut() {
            profile.summary.is_following = !following;
            profile.followers_count = if following {
                profile.followers_count.saturating_sub(1)
            } else {
                profile.followers_count.saturating_add(1)
            };
        }
        info!(user_id = %self.user_id, following = !following, "Follow state changed");
        self.notifier.success(if following {
            "Unfollowed successfully"
        } else {
            "Followed successfully"
        });
        Ok(!following)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn followers(&self, limit: usize, skip: usize) -> Result<Vec<UserSummary>> {
        self.directory.followers(&self.user_id, limit, skip).await
    }

    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn following(&self, limit: usize, skip: usize) -> Result<Vec<UserSummary>> {
        self.directory.following(&self.user_id, limit, skip).await
    }

    fn profile_slot(&self) -> MutexGuard<'_, Option<UserProfile>> {
        self.profile.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
