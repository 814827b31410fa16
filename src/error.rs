//! Error taxonomy shared by the REST boundary and the synchronizers.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable response: connection refused, timeout, TLS failure.
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-2xx response. `message` comes from the backend's `error` field
    /// when present.
    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },

    /// A local precondition failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("meme {0} is not in this feed")]
    UnknownMeme(String),

    #[error("not logged in")]
    NotAuthenticated,

    /// Reading or writing the persisted session token failed.
    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl Error {
    /// True for the failures that never reached the backend.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownMeme(_) | Self::NotAuthenticated
        )
    }

    /// HTTP status for server errors.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
