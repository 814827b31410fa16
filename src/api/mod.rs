//! REST boundary.
//!
//! `ApiClient` wraps a `reqwest::Client`, attaches the session's bearer token
//! to every authenticated call, and maps responses onto the crate's error
//! taxonomy.

mod traits;

pub use traits::{FeedBackend, FeedScope, UserDirectory};

use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::CLIENT_USER_AGENT;
use crate::error::{Error, Result};
use crate::models::{
    AuthResponse, CommentRecord, Credentials, ErrorBody, MemeRecord, MemeUpdate, NewMeme,
    ProfileUpdate, Registration, UserProfile, UserSummary,
};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config, session: Session) -> Result<Self> {
        let base = url::Url::parse(&config.api_url)
            .map_err(|e| Error::Validation(format!("invalid API URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(CLIENT_USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.session.token().ok_or(Error::NotAuthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check_status(builder.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    async fn send_ack(&self, builder: RequestBuilder) -> Result<()> {
        check_status(builder.send().await?).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "GET");
        let builder = self.authorized(self.http.get(&url).query(query))?;
        self.send_json(builder).await
    }

    async fn post_ack(&self, path: &str) -> Result<()> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");
        let builder = self.authorized(self.http.post(&url).json(&serde_json::json!({})))?;
        self.send_ack(builder).await
    }

    // Authentication

    /// Register a new account and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the session cannot be
    /// persisted.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile> {
        let builder = self
            .http
            .post(self.endpoint("auth/register"))
            .json(registration);
        let auth: AuthResponse = self.send_json(builder).await?;
        self.session.establish(auth.token, auth.user.clone()).await?;
        Ok(auth.user)
    }

    /// Log in and start a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the session cannot
    /// be persisted.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile> {
        let builder = self.http.post(self.endpoint("auth/login")).json(credentials);
        let auth: AuthResponse = self.send_json(builder).await?;
        self.session.establish(auth.token, auth.user.clone()).await?;
        Ok(auth.user)
    }

    /// End the session. Tokens are stateless on the backend, so this is local.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted token cannot be removed.
    pub async fn logout(&self) -> Result<()> {
        self.session.clear().await
    }

    /// Fetch the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session or the request fails.
    pub async fn me(&self) -> Result<UserProfile> {
        let user: UserProfile = self.get_json("auth/me", &[]).await?;
        self.session.set_user(user.clone());
        Ok(user)
    }

    /// Update the logged-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session or the request fails.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let builder = self.authorized(self.http.put(self.endpoint("auth/me")).json(update))?;
        let user: UserProfile = self.send_json(builder).await?;
        self.session.set_user(user.clone());
        Ok(user)
    }

    /// Pick up a persisted token and check it is still accepted.
    ///
    /// A token the backend rejects is discarded. Transport failures leave it
    /// in place so a later call can retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the backend is
    /// unreachable.
    pub async fn restore_session(&self) -> Result<Option<UserProfile>> {
        if self.session.load_stored_token().await?.is_none() {
            return Ok(None);
        }
        match self.me().await {
            Ok(user) => {
                info!(user = %user.summary.username, "Restored session");
                Ok(Some(user))
            }
            Err(Error::Server { status, message }) => {
                warn!(%status, message = %message, "Stored session rejected, clearing");
                self.session.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // Memes

    /// Fetch a single meme.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_meme(&self, meme_id: &str) -> Result<MemeRecord> {
        self.get_json(&format!("memes/{}", encode(meme_id)), &[]).await
    }

    /// Upload an image with a caption.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty uploads, otherwise an error if
    /// the request fails.
    pub async fn create_meme(&self, meme: NewMeme) -> Result<MemeRecord> {
        if meme.bytes.is_empty() {
            return Err(Error::Validation("Please select an image to upload".to_string()));
        }
        if !meme.mime_type.starts_with("image/") {
            return Err(Error::Validation("Please select an image file".to_string()));
        }
        let part = multipart::Part::bytes(meme.bytes)
            .file_name(meme.file_name)
            .mime_str(&meme.mime_type)
            .map_err(|e| Error::Validation(format!("invalid image type: {e}")))?;
        let form = multipart::Form::new()
            .part("image", part)
            .text("caption", meme.caption);

        let builder = self.authorized(self.http.post(self.endpoint("memes/")).multipart(form))?;
        let created: MemeRecord = self.send_json(builder).await?;
        info!(meme_id = %created.id, "Meme uploaded");
        Ok(created)
    }

    // Users

    /// Memes authored by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn user_memes(
        &self,
        user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<MemeRecord>> {
        self.get_json(
            &format!("users/{}/memes", encode(user_id)),
            &page_query(limit, skip),
        )
        .await
    }
}

#[async_trait]
impl FeedBackend for ApiClient {
    async fn fetch_memes(
        &self,
        scope: &FeedScope,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<MemeRecord>> {
        match scope {
            FeedScope::Global => self.get_json("memes/feed", &page_query(limit, skip)).await,
            FeedScope::User(user_id) => self.user_memes(user_id, limit, skip).await,
        }
    }

    async fn like(&self, meme_id: &str) -> Result<()> {
        self.post_ack(&format!("memes/{}/like", encode(meme_id))).await
    }

    async fn unlike(&self, meme_id: &str) -> Result<()> {
        self.post_ack(&format!("memes/{}/unlike", encode(meme_id))).await
    }

    async fn fetch_comments(
        &self,
        meme_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<CommentRecord>> {
        self.get_json(
            &format!("memes/{}/comments", encode(meme_id)),
            &page_query(limit, skip),
        )
        .await
    }

    async fn add_comment(&self, meme_id: &str, text: &str) -> Result<CommentRecord> {
        let url = self.endpoint(&format!("memes/{}/comments", encode(meme_id)));
        debug!(url = %url, "POST");
        let builder = self.authorized(
            self.http
                .post(&url)
                .json(&serde_json::json!({ "text": text })),
        )?;
        self.send_json(builder).await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("memes/comments/{}", encode(comment_id)));
        debug!(url = %url, "DELETE");
        let builder = self.authorized(self.http.delete(&url))?;
        self.send_ack(builder).await
    }

    async fn update_meme(&self, meme_id: &str, update: &MemeUpdate) -> Result<MemeRecord> {
        let url = self.endpoint(&format!("memes/{}", encode(meme_id)));
        debug!(url = %url, "PUT");
        let builder = self.authorized(self.http.put(&url).json(update))?;
        self.send_json(builder).await
    }

    async fn delete_meme(&self, meme_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("memes/{}", encode(meme_id)));
        debug!(url = %url, "DELETE");
        let builder = self.authorized(self.http.delete(&url))?;
        self.send_ack(builder).await
    }
}

#[async_trait]
impl UserDirectory for ApiClient {
    async fn search_users(
        &self,
        query: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<UserSummary>> {
        let mut params = vec![("q", query.to_string())];
        params.extend(page_query(limit, skip));
        self.get_json("users/search", &params).await
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        self.get_json(&format!("users/{}", encode(user_id)), &[]).await
    }

    async fn follow(&self, user_id: &str) -> Result<()> {
        self.post_ack(&format!("users/{}/follow", encode(user_id))).await
    }

    async fn unfollow(&self, user_id: &str) -> Result<()> {
        self.post_ack(&format!("users/{}/unfollow", encode(user_id))).await
    }

    async fn followers(
        &self,
        user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<UserSummary>> {
        self.get_json(
            &format!("users/{}/followers", encode(user_id)),
            &page_query(limit, skip),
        )
        .await
    }

    async fn following(
        &self,
        user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<UserSummary>> {
        self.get_json(
            &format!("users/{}/following", encode(user_id)),
            &page_query(limit, skip),
        )
        .await
    }
}

/// Turn a non-2xx response into `Error::Server`, keeping the backend's
/// `error` message when it sent one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(Error::Server { status, message })
}

fn page_query(limit: usize, skip: usize) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("skip", skip.to_string())]
}

fn encode(segment: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(segment)
}
