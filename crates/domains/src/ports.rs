//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::ledger::{LedgerKey, LedgerReceipt, LedgerWork, ViewerFlagMap};
use crate::media::{MediaUpload, StoredMedia};
use crate::models::{Story, StoryReply, Visibility};
use crate::visibility::VisibilityPredicate;

/// Global feed query. Rows come back ordered by
/// `(trending_score DESC, created_at DESC, id DESC)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub predicate: VisibilityPredicate,
    pub now: DateTime<Utc>,
    /// Resume strictly after this row
    pub cursor: Option<Uuid>,
    pub fetch: usize,
}

/// An author's own non-deleted stories, ordered by `(created_at DESC, id DESC)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorQuery {
    pub author_id: Uuid,
    pub cursor: Option<Uuid>,
    pub fetch: usize,
}

/// Persistence contract for stories.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StoryRepository: Send + Sync {
    async fn insert(&self, story: &Story) -> Result<()>;
    /// Returns soft-deleted rows too; callers decide.
    async fn get(&self, id: Uuid) -> Result<Option<Story>>;
    async fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()>;
    async fn set_published(&self, id: Uuid, is_published: bool) -> Result<()>;
    async fn mark_deleted(&self, id: Uuid) -> Result<()>;

    /// Live stories matching the predicate. An unknown cursor id is
    /// `InvalidInput`.
    async fn feed_page(&self, query: &FeedQuery) -> Result<Vec<Story>>;
    async fn author_page(&self, query: &AuthorQuery) -> Result<Vec<Story>>;
}

/// Persistence contract for story replies.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplyRepository: Send + Sync {
    async fn insert(&self, reply: &StoryReply) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<StoryReply>>;
    async fn mark_deleted(&self, id: Uuid) -> Result<()>;
    /// Non-deleted replies of one story, ordered by `id DESC`.
    async fn story_page(
        &self,
        story_id: Uuid,
        cursor: Option<Uuid>,
        fetch: usize,
    ) -> Result<Vec<StoryReply>>;
    /// Non-deleted replies of several stories, ascending by creation time.
    async fn live_for_stories(&self, story_ids: &[Uuid]) -> Result<Vec<StoryReply>>;
}

/// View/like facts plus the denormalized counters on the story row.
#[async_trait]
pub trait EngagementLedger: Send + Sync {
    /// Runs `work` against a fresh snapshot and applies its plan atomically.
    /// Returns `Conflict` when a concurrent writer won; the caller may retry.
    async fn run(&self, key: LedgerKey, work: &LedgerWork) -> Result<LedgerReceipt>;

    async fn viewer_flags(&self, viewer_id: Uuid, story_ids: &[Uuid]) -> Result<ViewerFlagMap>;
}

/// Read side of the friendship workflow.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FriendshipGraph: Send + Sync {
    /// Users with an ACTIVE edge to `user_id`, in either direction.
    async fn active_friends_of(&self, user_id: Uuid) -> Result<HashSet<Uuid>>;
}

/// Read side of block/mute management.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlockFilter: Send + Sync {
    /// Authors whose content `viewer_id` must not see.
    async fn excluded_for(&self, viewer_id: Uuid) -> Result<HashSet<Uuid>>;
}

/// Media storage contract for story uploads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia>;
}

/// Turns a bearer credential into a user id.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Uuid>;
}
