//! Domain models as the backend serves them.
//!
//! The client only ever holds page-scoped copies of these; every entity is
//! created and destroyed remotely.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CommentId, ConversationId, EntityKey, MessageId, PostId, ReelId, UserId};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// The signed-in user, fetched once per page load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, alias = "full_name")]
    pub display_name: Option<String>,
    /// URL or storage key of the avatar image.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// The slice of a user embedded in posts, comments and search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// A profile page: the user plus the aggregate follow graph around them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub post_count: u64,
    /// Whether the viewer follows this user.
    #[serde(default)]
    pub is_following: bool,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A chat room between exactly two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: [UserId; 2],
}

impl Conversation {
    /// The participant that is not `me`.
    pub fn peer_of(&self, me: UserId) -> Option<UserId> {
        match self.participants {
            [a, b] if a == me => Some(b),
            [a, b] if b == me => Some(a),
            _ => None,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    #[serde(alias = "text")]
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// One image or video attached to a post or reel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
    /// Filter name recorded at publish time.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub trim_start: Option<f64>,
    #[serde(default)]
    pub trim_end: Option<f64>,
}

/// Viewer-scoped engagement shared by posts and reels.
///
/// `like_count` and `is_liked` always move together; `is_saved` is
/// independent of both.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engagement {
    #[serde(default, alias = "likes_count")]
    pub like_count: u64,
    #[serde(default, alias = "comments_count")]
    pub comment_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author: UserSummary,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub engagement: Engagement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reel {
    pub id: ReelId,
    pub author: UserSummary,
    #[serde(default, alias = "caption")]
    pub content: String,
    /// Attachments in display order; a reel normally carries one video.
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub engagement: Engagement,
}

/// Everything that shows up in a list view, discriminated by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedItem {
    Post(Post),
    Reel(Reel),
}

impl FeedItem {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Post(p) => EntityKey::Post(p.id),
            Self::Reel(r) => EntityKey::Reel(r.id),
        }
    }

    pub fn author(&self) -> &UserSummary {
        match self {
            Self::Post(p) => &p.author,
            Self::Reel(r) => &r.author,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Post(p) => &p.content,
            Self::Reel(r) => &r.content,
        }
    }

    pub fn media(&self) -> &[MediaAttachment] {
        match self {
            Self::Post(p) => &p.media,
            Self::Reel(r) => &r.media,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Post(p) => p.created_at,
            Self::Reel(r) => r.created_at,
        }
    }

    pub fn engagement(&self) -> &Engagement {
        match self {
            Self::Post(p) => &p.engagement,
            Self::Reel(r) => &r.engagement,
        }
    }

    pub fn engagement_mut(&mut self) -> &mut Engagement {
        match self {
            Self::Post(p) => &mut p.engagement,
            Self::Reel(r) => &mut r.engagement,
        }
    }
}

/// A comment on a post or reel. `reply_to` gives one level of threading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub author: UserSummary,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, alias = "parent")]
    pub reply_to: Option<CommentId>,
    pub created_at: DateTime<Utc>,
    /// Filled in by the client from the endpoint the comment came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityKey>,
}

/// Server acknowledgement of a like/save/follow toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleAck {
    #[serde(alias = "is_liked", alias = "is_saved", alias = "is_following")]
    pub active: bool,
    /// Authoritative paired counter, when the endpoint reports one.
    #[serde(default, alias = "like_count", alias = "likes_count", alias = "followers_count")]
    pub count: Option<u64>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}
