//! Transient user-facing notifications.
//!
//! Synchronizers catch failures at the call site, log them, and publish a
//! short message here. Whatever renders the UI subscribes and shows them as
//! toasts. Publishing with no subscribers is not an error.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message.into());
    }

    fn publish(&self, level: NoticeLevel, message: String) {
        let _ = self.tx.send(Notice { level, message });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
