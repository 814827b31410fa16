//! In-memory backends for synchronizer tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::api::{FeedBackend, FeedScope, UserDirectory};
use crate::error::{Error, Result};
use crate::models::{CommentRecord, MemeRecord, MemeUpdate, UserProfile, UserSummary};

pub fn meme(id: &str) -> MemeRecord {
    MemeRecord {
        id: id.to_string(),
        author_id: "u1".to_string(),
        author: None,
        image_ref: format!("https://cdn.example.com/{id}.png"),
        caption: None,
        created_at: None,
        likes_count: 0,
        liked_by_current_viewer: false,
        comments_count: 0,
        recent_comments: Vec::new(),
    }
}

pub fn comment(id: &str, text: &str) -> CommentRecord {
    CommentRecord {
        id: id.to_string(),
        meme_id: None,
        author_id: "u1".to_string(),
        author: None,
        text: text.to_string(),
        created_at: None,
    }
}

fn server_error() -> Error {
    Error::Server {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "boom".to_string(),
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pages: Mutex<VecDeque<Vec<MemeRecord>>>,
    comment_pages: Mutex<VecDeque<Vec<CommentRecord>>>,
    offsets: Mutex<Vec<usize>>,
    comment_offsets: Mutex<Vec<usize>>,
    likes: Mutex<Vec<String>>,
    comments_posted: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_mutation: AtomicBool,
    hold: Mutex<Option<Arc<Notify>>>,
    held_like: Mutex<Option<(Arc<Notify>, bool)>>,
}

impl FakeBackend {
    pub fn push_page(&self, page: Vec<MemeRecord>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn push_comment_page(&self, page: Vec<CommentRecord>) {
        self.comment_pages.lock().unwrap().push_back(page);
    }

    pub fn fail_next_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_mutation(&self) {
        self.fail_mutation.store(true, Ordering::SeqCst);
    }

    /// Make fetches wait until the returned handle is notified.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Make the next like or unlike wait for the returned handle, then fail
    /// if `fail` is set.
    pub fn hold_next_like(&self, fail: bool) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.held_like.lock().unwrap() = Some((Arc::clone(&notify), fail));
        notify
    }

    pub fn requested_offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn requested_comment_offsets(&self) -> Vec<usize> {
        self.comment_offsets.lock().unwrap().clone()
    }

    pub fn like_calls(&self) -> Vec<String> {
        self.likes.lock().unwrap().clone()
    }

    pub fn comment_calls(&self) -> usize {
        self.comments_posted.load(Ordering::SeqCst)
    }

    fn take_failure(flag: &AtomicBool) -> Result<()> {
        if flag.swap(false, Ordering::SeqCst) {
            Err(server_error())
        } else {
            Ok(())
        }
    }

    async fn settle_like(&self) -> Result<()> {
        let held = self.held_like.lock().unwrap().take();
        if let Some((notify, fail)) = held {
            notify.notified().await;
            if fail {
                return Err(server_error());
            }
        }
        Self::take_failure(&self.fail_mutation)
    }

    async fn wait_if_held(&self) {
        let hold = self.hold.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }
}

#[async_trait]
impl FeedBackend for FakeBackend {
    async fn fetch_memes(
        &self,
        _scope: &FeedScope,
        _limit: usize,
        skip: usize,
    ) -> Result<Vec<MemeRecord>> {
        self.offsets.lock().unwrap().push(skip);
        self.wait_if_held().await;
        Self::take_failure(&self.fail_fetch)?;
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn like(&self, meme_id: &str) -> Result<()> {
        self.settle_like().await?;
        self.likes.lock().unwrap().push(format!("like {meme_id}"));
        Ok(())
    }

    async fn unlike(&self, meme_id: &str) -> Result<()> {
        self.settle_like().await?;
        self.likes.lock().unwrap().push(format!("unlike {meme_id}"));
        Ok(())
    }

    async fn fetch_comments(
        &self,
        _meme_id: &str,
        _limit: usize,
        skip: usize,
    ) -> Result<Vec<CommentRecord>> {
        self.comment_offsets.lock().unwrap().push(skip);
        Self::take_failure(&self.fail_fetch)?;
        Ok(self
            .comment_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn add_comment(&self, meme_id: &str, text: &str) -> Result<CommentRecord> {
        let n = self.comments_posted.fetch_add(1, Ordering::SeqCst) + 1;
        Self::take_failure(&self.fail_mutation)?;
        let mut created = comment(&format!("new-{n}"), text);
        created.meme_id = Some(meme_id.to_string());
        Ok(created)
    }

    async fn delete_comment(&self, _comment_id: &str) -> Result<()> {
        Self::take_failure(&self.fail_mutation)
    }

    async fn update_meme(&self, meme_id: &str, update: &MemeUpdate) -> Result<MemeRecord> {
        Self::take_failure(&self.fail_mutation)?;
        let mut updated = meme(meme_id);
        updated.caption = Some(update.caption.clone());
        Ok(updated)
    }

    async fn delete_meme(&self, _meme_id: &str) -> Result<()> {
        Self::take_failure(&self.fail_mutation)
    }
}

pub fn user(id: &str, username: &str) -> UserSummary {
    UserSummary {
        id: id.to_string(),
        username: username.to_string(),
        bio: None,
        profile_pic: None,
        is_following: false,
    }
}

/// Directory over a fixed user list. Search matches on username substring.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<Vec<UserSummary>>,
    queries: Mutex<Vec<String>>,
    follow_calls: Mutex<Vec<String>>,
    followers_count: AtomicUsize,
    delays: Mutex<Vec<(String, Duration)>>,
    follow_delay: Mutex<Option<Duration>>,
    fail_next: AtomicBool,
}

impl FakeDirectory {
    pub fn with_users(users: Vec<UserSummary>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    /// Delay responses to searches for `query`.
    pub fn delay_query(&self, query: &str, delay: Duration) {
        self.delays.lock().unwrap().push((query.to_string(), delay));
    }

    /// Delay every follow and unfollow response.
    pub fn delay_follows(&self, delay: Duration) {
        *self.follow_delay.lock().unwrap() = Some(delay);
    }

    async fn follow_pause(&self) {
        let delay = *self.follow_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn follow_calls(&self) -> Vec<String> {
        self.follow_calls.lock().unwrap().clone()
    }

    fn set_following(&self, user_id: &str, following: bool) {
        for user in self.users.lock().unwrap().iter_mut() {
            if user.id == user_id {
                user.is_following = following;
            }
        }
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn search_users(
        &self,
        query: &str,
        limit: usize,
        _skip: usize,
    ) -> Result<Vec<UserSummary>> {
        self.queries.lock().unwrap().push(query.to_string());
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        FakeBackend::take_failure(&self.fail_next)?;
        let needle = query.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        FakeBackend::take_failure(&self.fail_next)?;
        let summary = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| Error::Server {
                status: StatusCode::NOT_FOUND,
                message: "User not found".to_string(),
            })?;
        Ok(UserProfile {
            summary,
            email: None,
            followers_count: u32::try_from(self.followers_count.load(Ordering::SeqCst))
                .unwrap_or(u32::MAX),
            following_count: 0,
        })
    }

    async fn follow(&self, user_id: &str) -> Result<()> {
        self.follow_pause().await;
        FakeBackend::take_failure(&self.fail_next)?;
        self.follow_calls.lock().unwrap().push(format!("follow {user_id}"));
        self.set_following(user_id, true);
        self.followers_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unfollow(&self, user_id: &str) -> Result<()> {
        self.follow_pause().await;
        FakeBackend::take_failure(&self.fail_next)?;
        self.follow_calls.lock().unwrap().push(format!("unfollow {user_id}"));
        self.set_following(user_id, false);
        self.followers_count.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn followers(
        &self,
        _user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<UserSummary>> {
        FakeBackend::take_failure(&self.fail_next)?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn following(
        &self,
        _user_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<UserSummary>> {
        FakeBackend::take_failure(&self.fail_next)?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.is_following)
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}
