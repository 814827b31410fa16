//! Records exchanged with the backend.
//!
//! Field names follow the backend's JSON (`_id`, `user_id`, `image_url`, ...);
//! counters and flags the backend sometimes omits default to zero/false.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything with a stable identifier that pages can be merged on.
pub trait Identified {
    fn id(&self) -> &str;
}

/// Author reference embedded in memes and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, alias = "profile_picture")]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "user_id")]
    pub author_id: String,
    #[serde(rename = "user", default)]
    pub author: Option<AuthorRef>,
    #[serde(rename = "image_url")]
    pub image_ref: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(rename = "liked_by_user", alias = "is_liked", default)]
    pub liked_by_current_viewer: bool,
    #[serde(default)]
    pub comments_count: u32,
    #[serde(default)]
    pub recent_comments: Vec<CommentRecord>,
}

impl MemeRecord {
    /// Display name of the author, if the backend embedded one.
    #[must_use]
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.username.as_str())
    }

    #[must_use]
    pub fn created_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

impl Identified for MemeRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub meme_id: Option<String>,
    #[serde(rename = "user_id")]
    pub author_id: String,
    #[serde(rename = "user", default)]
    pub author: Option<AuthorRef>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl CommentRecord {
    #[must_use]
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.username.as_str())
    }

    #[must_use]
    pub fn created_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

impl Identified for CommentRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A user as returned by search and follower listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub is_following: bool,
}

impl Identified for UserSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub followers_count: u32,
    #[serde(default)]
    pub following_count: u32,
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Profile fields the backend lets a user change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

/// An image upload.
#[derive(Debug, Clone)]
pub struct NewMeme {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub caption: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemeUpdate {
    pub caption: String,
}

/// The backend's error payload: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Parse the timestamps the backend emits: ISO 8601 for comments, RFC 2822
/// (HTTP date) for memes serialized by the JSON encoder.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // isoformat() without an offset
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meme_from_feed_json() {
        let json = r#"{
            "_id": "m1",
            "user_id": "u1",
            "user": {"_id": "u1", "username": "alice", "profile_pic": null},
            "image_url": "https://cdn.example.com/m1.png",
            "caption": "hello",
            "created_at": "Mon, 01 Jan 2024 12:00:00 GMT",
            "likes_count": 4,
            "is_liked": true,
            "comments_count": 1,
            "recent_comments": [
                {"_id": "c1", "user_id": "u2", "text": "lol", "created_at": "2024-01-01T12:30:00"}
            ]
        }"#;
        let meme: MemeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(meme.id, "m1");
        assert_eq!(meme.author_name(), Some("alice"));
        assert!(meme.liked_by_current_viewer);
        assert_eq!(meme.likes_count, 4);
        assert_eq!(meme.recent_comments.len(), 1);
        assert!(meme.created_at_parsed().is_some());
        assert!(meme.recent_comments[0].created_at_parsed().is_some());
    }

    #[test]
    fn test_meme_missing_counters_default() {
        let json = r#"{"_id": "m2", "user_id": "u1", "image_url": "x"}"#;
        let meme: MemeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(meme.likes_count, 0);
        assert_eq!(meme.comments_count, 0);
        assert!(!meme.liked_by_current_viewer);
        assert!(meme.recent_comments.is_empty());
        assert_eq!(meme.author_name(), None);
    }

    #[test]
    fn test_user_profile_flattens_summary() {
        let json = r#"{
            "_id": "u1", "username": "alice", "bio": "", "email": "a@example.com",
            "followers_count": 3, "following_count": 7, "is_following": true
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.summary.username, "alice");
        assert!(profile.summary.is_following);
        assert_eq!(profile.followers_count, 3);
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            bio: Some("memes only".to_string()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"bio":"memes only"}"#
        );
    }
}
