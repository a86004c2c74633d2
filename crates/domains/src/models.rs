//! # Domain Models
//!
//! These structs represent the core entities of the Story feed.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// How long a story stays reachable after creation.
pub const STORY_TTL_HOURS: i64 = 24;

/// Upper bound on a reply comment, counted in characters after trimming.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Audience of a story.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Anyone
    #[default]
    Public,
    /// Active friends of the author only
    Friends,
    /// The author only
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Friends => "FRIENDS",
            Visibility::Private => "PRIVATE",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(Visibility::Public),
            "FRIENDS" => Ok(Visibility::Friends),
            "PRIVATE" => Ok(Visibility::Private),
            other => Err(DomainError::InvalidInput(format!(
                "unknown visibility '{other}'"
            ))),
        }
    }
}

/// An ephemeral media post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: Uuid,
    pub author_id: Uuid,
    /// Reference returned by the MediaStorage port
    pub media: String,
    pub location: Option<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation, never recomputed
    pub expires_at: DateTime<Utc>,
    pub is_published: bool,
    pub is_deleted: bool,
    pub view_count: i64,
    pub like_count: i64,
    /// Ranking signal maintained outside this service
    pub trending_score: f64,
}

impl Story {
    pub fn new(
        author_id: Uuid,
        media: String,
        visibility: Visibility,
        location: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            author_id,
            media,
            location,
            visibility,
            created_at: now,
            expires_at: expires_at_for(now),
            is_published: true,
            is_deleted: false,
            view_count: 0,
            like_count: 0,
            trending_score: 0.0,
        }
    }

    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Single liveness check shared by every read and engagement path.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_deleted && self.is_published && !self.is_expired(now)
    }

    /// Whole hours left before expiry, never negative.
    pub fn remaining_hours(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_hours().max(0)
    }
}

pub fn expires_at_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(STORY_TTL_HOURS)
}

/// A comment attached to a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryReply {
    pub id: Uuid,
    pub story_id: Uuid,
    pub author_id: Uuid,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl StoryReply {
    pub fn new(story_id: Uuid, author_id: Uuid, comment: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            story_id,
            author_id,
            comment,
            created_at: now,
            is_deleted: false,
        }
    }
}

/// Trims a comment and checks it is non-empty and within bounds.
pub fn normalize_comment(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidInput("comment must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(DomainError::InvalidInput(format!(
            "comment exceeds {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// State of a friendship edge. Only `Active` grants FRIENDS visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendshipStatus {
    Pending,
    Active,
    Declined,
}

/// Why a viewer should not see an author's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionKind {
    /// Hides content in both directions
    Block,
    /// Hides the muted author from the muting viewer only
    Mute,
}
