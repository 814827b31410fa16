//! Cancel-and-restart delay.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Runs an action once a quiet period passes with no newer schedule.
///
/// Scheduling cancels the pending timer and starts a fresh one. Only the
/// timer is cancellable: an action that has already started runs to
/// completion.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` after the quiet period unless rescheduled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.swap(Some(token.clone())) {
            previous.cancel();
        }

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => action.await,
            }
        });
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.swap(None) {
            previous.cancel();
        }
    }

    fn swap(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, next)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
