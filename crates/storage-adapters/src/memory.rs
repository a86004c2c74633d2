//! In-memory implementation of every storage port.
//!
//! Ledger units of work are serialized per story with an async mutex, which
//! gives the same guarantee as a row lock on the story in a database.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use domains::{
    AuthorQuery, BlockFilter, DomainError, EngagementLedger, ExclusionKind, FeedQuery,
    FriendshipGraph, FriendshipStatus, LedgerKey, LedgerReceipt, LedgerSnapshot, LedgerWork,
    MediaStorage, MediaUpload, ReplyRepository, Result, RowChange, Story, StoryReply,
    StoryRepository, StoredMedia, ViewerFlagMap, ViewerFlags, Visibility,
};
use mime::Mime;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::content::{content_key, relative_path};

/// Stories, replies and the engagement ledger.
#[derive(Default)]
pub struct InMemoryStore {
    stories: DashMap<Uuid, Story>,
    replies: DashMap<Uuid, StoryReply>,
    views: DashSet<LedgerKey>,
    likes: DashSet<LedgerKey>,
    /// One entry per engaged story, dropped on soft delete. Expired stories
    /// keep theirs until deleted.
    ledger_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Global feed order: trending score, then recency, then id, all descending.
fn rank_order(a: &Story, b: &Story) -> Ordering {
    b.trending_score
        .total_cmp(&a.trending_score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Own-stories order: recency, then id, descending.
fn recency_order(a: &Story, b: &Story) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a story row as-is (e.g. with a past expiry).
    pub fn put_story(&self, story: Story) {
        self.stories.insert(story.id, story);
    }

    /// Stands in for the external ranking job.
    pub fn set_trending_score(&self, story_id: Uuid, score: f64) -> Result<()> {
        let mut story = self
            .stories
            .get_mut(&story_id)
            .ok_or_else(|| DomainError::story_not_found(story_id))?;
        story.trending_score = score;
        Ok(())
    }

    pub fn view_rows(&self, story_id: Uuid) -> usize {
        self.views.iter().filter(|k| k.story_id == story_id).count()
    }

    pub fn like_rows(&self, story_id: Uuid) -> usize {
        self.likes.iter().filter(|k| k.story_id == story_id).count()
    }

    fn cursor_row(&self, cursor: Option<Uuid>) -> Result<Option<Story>> {
        match cursor {
            None => Ok(None),
            Some(id) => self
                .stories
                .get(&id)
                .map(|s| Some(s.clone()))
                .ok_or_else(|| DomainError::InvalidInput("invalid cursor".into())),
        }
    }

    /// Filters, orders and cuts a listing, resuming strictly after `cursor`.
    fn page_by(
        &self,
        cursor: Option<Story>,
        fetch: usize,
        keep: impl Fn(&Story) -> bool,
        order: fn(&Story, &Story) -> Ordering,
    ) -> Vec<Story> {
        let mut rows: Vec<Story> = self
            .stories
            .iter()
            .filter(|s| keep(s.value()))
            .filter(|s| {
                cursor
                    .as_ref()
                    .is_none_or(|c| order(c, s.value()) == Ordering::Less)
            })
            .map(|s| s.value().clone())
            .collect();
        rows.sort_by(order);
        rows.truncate(fetch);
        rows
    }

    fn update_story(&self, id: Uuid, apply: impl FnOnce(&mut Story)) -> Result<()> {
        let mut story = self
            .stories
            .get_mut(&id)
            .ok_or_else(|| DomainError::story_not_found(id))?;
        apply(&mut story);
        Ok(())
    }

    fn apply_row(set: &DashSet<LedgerKey>, key: LedgerKey, change: RowChange) {
        match change {
            RowChange::Insert => {
                set.insert(key);
            }
            RowChange::Remove => {
                set.remove(&key);
            }
            RowChange::Keep => {}
        }
    }
}

#[async_trait]
impl StoryRepository for InMemoryStore {
    async fn insert(&self, story: &Story) -> Result<()> {
        if self.stories.contains_key(&story.id) {
            return Err(DomainError::Conflict(format!("story {} already exists", story.id)));
        }
        self.stories.insert(story.id, story.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        Ok(self.stories.get(&id).map(|s| s.clone()))
    }

    async fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()> {
        self.update_story(id, |s| s.visibility = visibility)
    }

    async fn set_published(&self, id: Uuid, is_published: bool) -> Result<()> {
        self.update_story(id, |s| s.is_published = is_published)
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<()> {
        self.update_story(id, |s| s.is_deleted = true)?;
        // Deleted stories never take another ledger write.
        self.ledger_locks.remove(&id);
        Ok(())
    }

    async fn feed_page(&self, query: &FeedQuery) -> Result<Vec<Story>> {
        let cursor = self.cursor_row(query.cursor)?;
        Ok(self.page_by(
            cursor,
            query.fetch,
            |s| query.predicate.permits(s, query.now),
            rank_order,
        ))
    }

    async fn author_page(&self, query: &AuthorQuery) -> Result<Vec<Story>> {
        let cursor = self.cursor_row(query.cursor)?;
        Ok(self.page_by(
            cursor,
            query.fetch,
            |s| s.author_id == query.author_id && !s.is_deleted,
            recency_order,
        ))
    }
}

#[async_trait]
impl ReplyRepository for InMemoryStore {
    async fn insert(&self, reply: &StoryReply) -> Result<()> {
        self.replies.insert(reply.id, reply.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoryReply>> {
        Ok(self.replies.get(&id).map(|r| r.clone()))
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<()> {
        let mut reply = self
            .replies
            .get_mut(&id)
            .ok_or_else(|| DomainError::reply_not_found(id))?;
        reply.is_deleted = true;
        Ok(())
    }

    async fn story_page(
        &self,
        story_id: Uuid,
        cursor: Option<Uuid>,
        fetch: usize,
    ) -> Result<Vec<StoryReply>> {
        let mut rows: Vec<StoryReply> = self
            .replies
            .iter()
            .filter(|r| r.story_id == story_id && !r.is_deleted)
            .filter(|r| cursor.is_none_or(|c| r.id < c))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(fetch);
        Ok(rows)
    }

    async fn live_for_stories(&self, story_ids: &[Uuid]) -> Result<Vec<StoryReply>> {
        let wanted: HashSet<&Uuid> = story_ids.iter().collect();
        let mut rows: Vec<StoryReply> = self
            .replies
            .iter()
            .filter(|r| wanted.contains(&r.story_id) && !r.is_deleted)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl EngagementLedger for InMemoryStore {
    async fn run(&self, key: LedgerKey, work: &LedgerWork) -> Result<LedgerReceipt> {
        let lock = self.ledger_locks.entry(key.story_id).or_default().clone();
        let _guard = lock.lock().await;

        let snapshot = LedgerSnapshot {
            story: self.stories.get(&key.story_id).map(|s| s.clone()),
            has_viewed: self.views.contains(&key),
            has_liked: self.likes.contains(&key),
        };
        let plan = work(&snapshot)?;
        plan.check_against(&snapshot)?;

        let mut story = self
            .stories
            .get_mut(&key.story_id)
            .ok_or_else(|| DomainError::story_not_found(key.story_id))?;
        Self::apply_row(&self.views, key, plan.view);
        Self::apply_row(&self.likes, key, plan.like);
        story.view_count += plan.view.counter_delta();
        story.like_count += plan.like.counter_delta();

        debug!(story_id = %key.story_id, ?plan, "ledger unit of work applied");
        Ok(LedgerReceipt {
            plan,
            view_count: story.view_count,
            like_count: story.like_count,
        })
    }

    async fn viewer_flags(&self, viewer_id: Uuid, story_ids: &[Uuid]) -> Result<ViewerFlagMap> {
        Ok(story_ids
            .iter()
            .map(|story_id| {
                let key = LedgerKey::new(*story_id, viewer_id);
                let flags = ViewerFlags {
                    has_viewed: self.views.contains(&key),
                    has_liked: self.likes.contains(&key),
                };
                (*story_id, flags)
            })
            .collect())
    }
}

/// Friendship edges and block/mute lists, as the collaborating services
/// would expose them.
#[derive(Default)]
pub struct InMemorySocialGraph {
    /// Keyed by the ordered pair so the edge is undirected
    friendships: DashMap<(Uuid, Uuid), FriendshipStatus>,
    /// (actor, target)
    exclusions: DashMap<(Uuid, Uuid), ExclusionKind>,
}

fn edge(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_friendship(&self, a: Uuid, b: Uuid, status: FriendshipStatus) {
        self.friendships.insert(edge(a, b), status);
    }

    pub fn befriend(&self, a: Uuid, b: Uuid) {
        self.set_friendship(a, b, FriendshipStatus::Active);
    }

    pub fn unfriend(&self, a: Uuid, b: Uuid) {
        self.friendships.remove(&edge(a, b));
    }

    pub fn block(&self, actor: Uuid, target: Uuid) {
        self.exclusions.insert((actor, target), ExclusionKind::Block);
    }

    pub fn mute(&self, actor: Uuid, target: Uuid) {
        self.exclusions.insert((actor, target), ExclusionKind::Mute);
    }

    pub fn clear_exclusion(&self, actor: Uuid, target: Uuid) {
        self.exclusions.remove(&(actor, target));
    }
}

#[async_trait]
impl FriendshipGraph for InMemorySocialGraph {
    async fn active_friends_of(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        Ok(self
            .friendships
            .iter()
            .filter(|e| *e.value() == FriendshipStatus::Active)
            .filter_map(|e| {
                let (a, b) = *e.key();
                if a == user_id {
                    Some(b)
                } else if b == user_id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl BlockFilter for InMemorySocialGraph {
    async fn excluded_for(&self, viewer_id: Uuid) -> Result<HashSet<Uuid>> {
        Ok(self
            .exclusions
            .iter()
            .filter_map(|e| {
                let (actor, target) = *e.key();
                if actor == viewer_id {
                    Some(target)
                } else if target == viewer_id && *e.value() == ExclusionKind::Block {
                    Some(actor)
                } else {
                    None
                }
            })
            .collect())
    }
}

/// Keeps uploads in memory, content-addressed like the disk adapter.
#[derive(Default)]
pub struct InMemoryMediaStorage {
    objects: DashMap<String, (Mime, Bytes)>,
}

impl InMemoryMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl MediaStorage for InMemoryMediaStorage {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia> {
        let key = content_key(&upload.data);
        let url = format!("memory://{}", relative_path(&key, &upload.content_type));
        self.objects
            .entry(key.clone())
            .or_insert((upload.content_type, upload.data));
        Ok(StoredMedia { key, url })
    }
}
