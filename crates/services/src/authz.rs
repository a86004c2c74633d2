//! Authorization and liveness checks invoked at the top of each use case.

use chrono::{DateTime, Utc};
use domains::{DomainError, Result, Story, StoryReply};
use uuid::Uuid;

/// Only the author may mutate a story.
pub fn ensure_owner(story: &Story, requester_id: Uuid) -> Result<()> {
    if story.is_authored_by(requester_id) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "only the author may modify story {}",
            story.id
        )))
    }
}

/// A reply may be removed by its author or by the parent story's author.
pub fn ensure_reply_deleter(
    reply: &StoryReply,
    story_author: Option<Uuid>,
    requester_id: Uuid,
) -> Result<()> {
    if reply.author_id == requester_id || story_author == Some(requester_id) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "not allowed to delete reply {}",
            reply.id
        )))
    }
}

/// Present and not soft-deleted, regardless of publish state or expiry.
pub fn require_existing(story: Option<Story>, story_id: Uuid) -> Result<Story> {
    story
        .filter(|s| !s.is_deleted)
        .ok_or_else(|| DomainError::story_not_found(story_id))
}

/// Not deleted, published and unexpired.
pub fn require_live(story: Option<&Story>, story_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    match story {
        Some(s) if s.is_live(now) => Ok(()),
        _ => Err(DomainError::story_not_found(story_id)),
    }
}
