//! Explicit session context.
//!
//! Holds the bearer token and the logged-in user. Set at login/registration,
//! cleared at logout, read by the request layer for every call. When a store
//! path is configured the token is also written to disk so the next run can
//! pick it up again.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::error::Result;
use crate::models::UserProfile;

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserProfile>,
}

/// Shared handle to the current session. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
    store: Option<PathBuf>,
}

impl Session {
    /// An in-memory session that is lost when the process exits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A session whose token is persisted at `path`.
    #[must_use]
    pub fn with_store(path: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::default(),
            store: Some(path.into()),
        }
    }

    #[must_use]
    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read(|s| s.token.clone())
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.read(|s| s.user.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(|s| s.token.is_some())
    }

    /// Id of the logged-in user, if known.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.read(|s| s.user.as_ref().map(|u| u.summary.id.clone()))
    }

    /// Start a session after a successful login or registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written to the store.
    pub async fn establish(&self, token: String, user: UserProfile) -> Result<()> {
        if let Some(path) = &self.store {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, token.as_bytes()).await?;
            debug!(path = %path.display(), "Session token persisted");
        }
        info!(user = %user.summary.username, "Session established");
        self.write(|s| {
            s.token = Some(token);
            s.user = Some(user);
        });
        Ok(())
    }

    /// Replace the cached user after a profile fetch or update.
    pub fn set_user(&self, user: UserProfile) {
        self.write(|s| s.user = Some(user));
    }

    /// Load a previously persisted token without verifying it.
    ///
    /// Returns the token if one was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read.
    pub async fn load_stored_token(&self) -> Result<Option<String>> {
        let Some(path) = &self.store else {
            return Ok(None);
        };
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token = raw.trim().to_string();
        if token.is_empty() {
            return Ok(None);
        }
        self.write(|s| s.token = Some(token.clone()));
        Ok(Some(token))
    }

    /// Use a token obtained elsewhere (for example from the environment).
    pub fn set_token(&self, token: String) {
        self.write(|s| s.token = Some(token));
    }

    /// End the session and remove any persisted token.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored token exists but cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        self.write(|s| *s = SessionState::default());
        if let Some(path) = &self.store {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!("Session cleared");
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut SessionState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
