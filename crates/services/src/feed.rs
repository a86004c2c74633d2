//! # Feed Composer
//!
//! Ranked, cursor-paginated global feed and the author's own story list.
//!
//! The global feed is ordered by `trending_score`, which is updated outside
//! this service. The cursor is a story id, and resuming compares against the
//! cursor row's score at the time of the next request. A score change between
//! two page fetches can therefore skip or repeat a story. This is accepted for
//! now; snapshotting ranks needs a product decision first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    build_visibility_predicate, AuthorQuery, BlockFilter, Clock, DomainError, EngagementLedger,
    FeedQuery, FriendshipGraph, Page, PageRequest, ReplyRepository, Result, Story, StoryReply,
    StoryRepository, ViewerFlagMap, VisibilityPredicate,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// A story as shown to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub story: Story,
    pub remaining_hours: i64,
    pub viewed_by_me: bool,
    pub liked_by_me: bool,
}

/// A story in the author's self-management list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnStory {
    #[serde(flatten)]
    pub story: Story,
    pub remaining_hours: i64,
    /// Non-deleted replies, oldest first
    pub replies: Vec<StoryReply>,
}

pub struct FeedComposer {
    stories: Arc<dyn StoryRepository>,
    replies: Arc<dyn ReplyRepository>,
    ledger: Arc<dyn EngagementLedger>,
    friends: Arc<dyn FriendshipGraph>,
    blocks: Arc<dyn BlockFilter>,
    clock: Arc<dyn Clock>,
}

impl FeedComposer {
    pub fn new(
        stories: Arc<dyn StoryRepository>,
        replies: Arc<dyn ReplyRepository>,
        ledger: Arc<dyn EngagementLedger>,
        friends: Arc<dyn FriendshipGraph>,
        blocks: Arc<dyn BlockFilter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stories,
            replies,
            ledger,
            friends,
            blocks,
            clock,
        }
    }

    /// Asks the collaborators for the viewer's friend and exclusion sets.
    pub async fn resolve_visibility(&self, viewer_id: Uuid) -> Result<VisibilityPredicate> {
        let friend_ids = self.friends.active_friends_of(viewer_id).await?;
        let excluded = self.blocks.excluded_for(viewer_id).await?;
        Ok(build_visibility_predicate(viewer_id, &friend_ids, &excluded))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_stories(&self, viewer_id: Uuid, page: PageRequest) -> Result<Page<FeedItem>> {
        let predicate = self.resolve_visibility(viewer_id).await?;
        let now = self.clock.now();
        let query = FeedQuery {
            predicate,
            now,
            cursor: page.cursor(),
            fetch: page.fetch_size(),
        };
        let rows = self.stories.feed_page(&query).await?;
        let page = Page::from_overfetch(rows, page.limit(), |story| story.id);
        debug!(items = page.items.len(), last = page.is_last(), "feed page composed");

        let flags = self.flags_for(viewer_id, &page.items).await?;
        Ok(page.map(|story| decorate(story, &flags, now)))
    }

    /// A single story, if the viewer may currently see it.
    #[tracing::instrument(skip(self))]
    pub async fn get_story(&self, viewer_id: Uuid, story_id: Uuid) -> Result<FeedItem> {
        let now = self.clock.now();
        let story = self
            .stories
            .get(story_id)
            .await?
            .ok_or_else(|| DomainError::story_not_found(story_id))?;
        let predicate = self.resolve_visibility(viewer_id).await?;
        if !predicate.permits(&story, now) {
            return Err(DomainError::story_not_found(story_id));
        }

        let flags = self.flags_for(viewer_id, std::slice::from_ref(&story)).await?;
        Ok(decorate(story, &flags, now))
    }

    /// The author's non-deleted stories, newest first, including unpublished
    /// and expired ones so they can still be managed.
    #[tracing::instrument(skip(self))]
    pub async fn get_my_stories(&self, author_id: Uuid, page: PageRequest) -> Result<Page<OwnStory>> {
        let query = AuthorQuery {
            author_id,
            cursor: page.cursor(),
            fetch: page.fetch_size(),
        };
        let rows = self.stories.author_page(&query).await?;
        let page = Page::from_overfetch(rows, page.limit(), |story| story.id);

        let ids: Vec<Uuid> = page.items.iter().map(|s| s.id).collect();
        let mut threads: HashMap<Uuid, Vec<StoryReply>> = HashMap::new();
        if !ids.is_empty() {
            for reply in self.replies.live_for_stories(&ids).await? {
                threads.entry(reply.story_id).or_default().push(reply);
            }
        }

        let now = self.clock.now();
        Ok(page.map(|story| OwnStory {
            remaining_hours: story.remaining_hours(now),
            replies: threads.remove(&story.id).unwrap_or_default(),
            story,
        }))
    }

    async fn flags_for(&self, viewer_id: Uuid, stories: &[Story]) -> Result<ViewerFlagMap> {
        if stories.is_empty() {
            return Ok(ViewerFlagMap::new());
        }
        let ids: Vec<Uuid> = stories.iter().map(|s| s.id).collect();
        self.ledger.viewer_flags(viewer_id, &ids).await
    }
}

fn decorate(story: Story, flags: &ViewerFlagMap, now: DateTime<Utc>) -> FeedItem {
    let viewer = flags.get(&story.id).copied().unwrap_or_default();
    FeedItem {
        remaining_hours: story.remaining_hours(now),
        viewed_by_me: viewer.has_viewed,
        liked_by_me: viewer.has_liked,
        story,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use domains::{
        AccessClause, LedgerKey, LedgerReceipt, LedgerWork, ManualClock, MockBlockFilter,
        MockFriendshipGraph, MockReplyRepository, MockStoryRepository, ViewerFlags, Visibility,
    };
    use std::collections::HashSet;

    /// Ledger that only answers flag lookups.
    struct FlagsOnly(ViewerFlagMap);

    #[async_trait]
    impl EngagementLedger for FlagsOnly {
        async fn run(&self, _key: LedgerKey, _work: &LedgerWork) -> Result<LedgerReceipt> {
            Err(DomainError::Storage("not used".into()))
        }

        async fn viewer_flags(&self, _viewer_id: Uuid, story_ids: &[Uuid]) -> Result<ViewerFlagMap> {
            Ok(self
                .0
                .iter()
                .filter(|(id, _)| story_ids.contains(id))
                .map(|(id, flags)| (*id, *flags))
                .collect())
        }
    }

    struct Fixture {
        stories: MockStoryRepository,
        replies: MockReplyRepository,
        friends: MockFriendshipGraph,
        blocks: MockBlockFilter,
        flags: ViewerFlagMap,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut friends = MockFriendshipGraph::new();
            friends.expect_active_friends_of().returning(|_| Ok(HashSet::new()));
            let mut blocks = MockBlockFilter::new();
            blocks.expect_excluded_for().returning(|_| Ok(HashSet::new()));
            Self {
                stories: MockStoryRepository::new(),
                replies: MockReplyRepository::new(),
                friends,
                blocks,
                flags: ViewerFlagMap::new(),
                clock: Arc::new(ManualClock::default()),
            }
        }

        fn build(self) -> FeedComposer {
            FeedComposer::new(
                Arc::new(self.stories),
                Arc::new(self.replies),
                Arc::new(FlagsOnly(self.flags)),
                Arc::new(self.friends),
                Arc::new(self.blocks),
                self.clock,
            )
        }
    }

    fn story(author: Uuid, visibility: Visibility, now: DateTime<Utc>) -> Story {
        Story::new(author, "m".into(), visibility, None, now)
    }

    #[tokio::test]
    async fn predicate_includes_friends_and_exclusions() {
        let viewer = Uuid::now_v7();
        let friend = Uuid::now_v7();
        let blocked = Uuid::now_v7();
        let mut fx = Fixture::new();
        fx.friends = MockFriendshipGraph::new();
        fx.friends
            .expect_active_friends_of()
            .withf(move |id| *id == viewer)
            .returning(move |_| Ok(HashSet::from([friend])));
        fx.blocks = MockBlockFilter::new();
        fx.blocks
            .expect_excluded_for()
            .returning(move |_| Ok(HashSet::from([blocked])));
        fx.stories
            .expect_feed_page()
            .withf(move |q: &FeedQuery| {
                q.predicate.friend_ids().is_some_and(|ids| ids.contains(&friend))
                    && q.predicate.excluded_authors.contains(&blocked)
                    && q.fetch == 11
            })
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let page = fx
            .build()
            .get_stories(viewer, PageRequest::first(10))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn predicate_without_friends_has_no_friends_clause() {
        let viewer = Uuid::now_v7();
        let mut fx = Fixture::new();
        fx.stories
            .expect_feed_page()
            .withf(move |q: &FeedQuery| {
                q.predicate.any_of == vec![AccessClause::OwnContent(viewer), AccessClause::Public]
            })
            .times(1)
            .returning(|_| Ok(Vec::new()));

        fx.build()
            .get_stories(viewer, PageRequest::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn feed_items_carry_remaining_hours_and_viewer_flags() {
        let viewer = Uuid::now_v7();
        let mut fx = Fixture::new();
        let now = fx.clock.now();
        let s = story(Uuid::now_v7(), Visibility::Public, now - Duration::hours(5));
        let id = s.id;
        fx.flags.insert(
            id,
            ViewerFlags {
                has_viewed: true,
                has_liked: false,
            },
        );
        fx.stories
            .expect_feed_page()
            .returning(move |_| Ok(vec![s.clone()]));

        let page = fx
            .build()
            .get_stories(viewer, PageRequest::default())
            .await
            .unwrap();
        let item = &page.items[0];
        assert_eq!(item.remaining_hours, 19);
        assert!(item.viewed_by_me);
        assert!(!item.liked_by_me);
    }

    #[tokio::test]
    async fn overfetched_row_becomes_next_page() {
        let viewer = Uuid::now_v7();
        let mut fx = Fixture::new();
        let now = fx.clock.now();
        let rows: Vec<Story> = (0..3)
            .map(|_| story(Uuid::now_v7(), Visibility::Public, now))
            .collect();
        let cursor = rows[1].id;
        fx.stories
            .expect_feed_page()
            .returning(move |_| Ok(rows.clone()));

        let page = fx
            .build()
            .get_stories(viewer, PageRequest::first(2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, Some(cursor));
    }

    #[tokio::test]
    async fn hidden_story_by_id_is_not_found() {
        let viewer = Uuid::now_v7();
        let mut fx = Fixture::new();
        let s = story(Uuid::now_v7(), Visibility::Friends, fx.clock.now());
        let id = s.id;
        fx.stories.expect_get().returning(move |_| Ok(Some(s.clone())));

        let err = fx.build().get_story(viewer, id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound("story", _)));
    }

    #[tokio::test]
    async fn own_stories_group_replies_per_story() {
        let author = Uuid::now_v7();
        let mut fx = Fixture::new();
        let now = fx.clock.now();
        let newer = story(author, Visibility::Private, now);
        let older = story(author, Visibility::Public, now - Duration::hours(30));
        let (newer_id, older_id) = (newer.id, older.id);
        let first = StoryReply::new(newer_id, Uuid::now_v7(), "first".into(), now);
        let second = StoryReply::new(newer_id, Uuid::now_v7(), "second".into(), now);
        fx.stories
            .expect_author_page()
            .withf(move |q: &AuthorQuery| q.author_id == author && q.cursor.is_none())
            .returning(move |_| Ok(vec![newer.clone(), older.clone()]));
        fx.replies
            .expect_live_for_stories()
            .withf(move |ids: &[Uuid]| ids == [newer_id, older_id])
            .returning(move |_| Ok(vec![first.clone(), second.clone()]));

        let page = fx
            .build()
            .get_my_stories(author, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        let comments: Vec<&str> = page.items[0]
            .replies
            .iter()
            .map(|r| r.comment.as_str())
            .collect();
        assert_eq!(comments, ["first", "second"]);
        assert!(page.items[1].replies.is_empty());
        assert_eq!(page.items[1].remaining_hours, 0);
    }
}
