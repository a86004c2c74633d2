//! # Reply Thread
//!
//! Append-only comments on a story. Listing is reserved to the story owner;
//! deletion is open to the reply author and the story owner.

use std::sync::Arc;

use domains::{
    normalize_comment, Clock, DomainError, Page, PageRequest, ReplyRepository, Result,
    StoryReply, StoryRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::authz::{ensure_reply_deleter, require_live};

pub struct ReplyThread {
    stories: Arc<dyn StoryRepository>,
    replies: Arc<dyn ReplyRepository>,
    clock: Arc<dyn Clock>,
}

impl ReplyThread {
    pub fn new(
        stories: Arc<dyn StoryRepository>,
        replies: Arc<dyn ReplyRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stories,
            replies,
            clock,
        }
    }

    #[tracing::instrument(skip(self, comment))]
    pub async fn add_reply(&self, story_id: Uuid, author_id: Uuid, comment: &str) -> Result<StoryReply> {
        let now = self.clock.now();
        let story = self.stories.get(story_id).await?;
        require_live(story.as_ref(), story_id, now)?;
        let comment = normalize_comment(comment)?;

        let reply = StoryReply::new(story_id, author_id, comment, now);
        self.replies.insert(&reply).await?;

        info!(%story_id, reply_id = %reply.id, "reply added");
        Ok(reply)
    }

    /// Owner-only listing, newest first. A missing story and someone else's
    /// story look the same to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn get_replies(
        &self,
        story_id: Uuid,
        requester_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<StoryReply>> {
        let story = self
            .stories
            .get(story_id)
            .await?
            .filter(|s| !s.is_deleted && s.is_authored_by(requester_id))
            .ok_or_else(DomainError::access_denied)?;

        let rows = self
            .replies
            .story_page(story.id, page.cursor(), page.fetch_size())
            .await?;
        Ok(Page::from_overfetch(rows, page.limit(), |reply| reply.id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_reply(&self, reply_id: Uuid, requester_id: Uuid) -> Result<()> {
        let reply = self
            .replies
            .get(reply_id)
            .await?
            .filter(|r| !r.is_deleted)
            .ok_or_else(|| DomainError::reply_not_found(reply_id))?;

        let story_author = if reply.author_id == requester_id {
            None
        } else {
            self.stories.get(reply.story_id).await?.map(|s| s.author_id)
        };
        ensure_reply_deleter(&reply, story_author, requester_id)?;

        self.replies.mark_deleted(reply_id).await?;
        info!(%reply_id, story_id = %reply.story_id, "reply deleted");
        Ok(())
    }
}
