//! # Story Lifecycle
//!
//! Creation, visibility change, publish toggle and soft deletion. Every
//! mutation is a single-row write guarded by the row's own deleted/expiry
//! state, checked at write time.

use std::sync::Arc;

use domains::{
    Clock, DomainError, MediaStorage, MediaUpload, Result, Story, StoryRepository, Visibility,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authz::{ensure_owner, require_existing};

/// Input of [`StoryLifecycle::create`].
#[derive(Debug, Clone, Default)]
pub struct NewStory {
    pub upload: Option<MediaUpload>,
    pub visibility: Option<Visibility>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Published,
    Unpublished,
}

impl PublishAction {
    pub fn label(&self) -> &'static str {
        match self {
            PublishAction::Published => "published",
            PublishAction::Unpublished => "unpublished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishToggle {
    pub story_id: Uuid,
    pub is_published: bool,
    pub action: PublishAction,
}

pub struct StoryLifecycle {
    stories: Arc<dyn StoryRepository>,
    media: Arc<dyn MediaStorage>,
    clock: Arc<dyn Clock>,
}

impl StoryLifecycle {
    pub fn new(
        stories: Arc<dyn StoryRepository>,
        media: Arc<dyn MediaStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stories,
            media,
            clock,
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create(&self, author_id: Uuid, request: NewStory) -> Result<Story> {
        let upload = request
            .upload
            .ok_or_else(|| DomainError::InvalidInput("a media file is required".into()))?;
        upload.validate()?;

        let location = request
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        let stored = self.media.store(upload).await?;
        let story = Story::new(
            author_id,
            stored.url,
            request.visibility.unwrap_or_default(),
            location,
            self.clock.now(),
        );
        if let Err(err) = self.stories.insert(&story).await {
            warn!(
                story_id = %story.id,
                media_key = %stored.key,
                error = %err,
                "story insert failed, stored media is orphaned"
            );
            return Err(err);
        }

        info!(story_id = %story.id, visibility = %story.visibility, "story created");
        Ok(story)
    }

    /// Allowed up to the moment of expiry and beyond; only deletion blocks it.
    #[tracing::instrument(skip(self))]
    pub async fn change_visibility(
        &self,
        story_id: Uuid,
        requester_id: Uuid,
        visibility: Visibility,
    ) -> Result<Story> {
        let mut story = self.owned_story(story_id, requester_id).await?;
        self.stories.set_visibility(story_id, visibility).await?;
        story.visibility = visibility;

        info!(%story_id, %visibility, "story visibility changed");
        Ok(story)
    }

    #[tracing::instrument(skip(self))]
    pub async fn toggle_published(&self, story_id: Uuid, requester_id: Uuid) -> Result<PublishToggle> {
        let story = self.owned_story(story_id, requester_id).await?;
        if story.is_expired(self.clock.now()) {
            return Err(DomainError::InvalidState("story has expired".into()));
        }

        let is_published = !story.is_published;
        self.stories.set_published(story_id, is_published).await?;

        let action = if is_published {
            PublishAction::Published
        } else {
            PublishAction::Unpublished
        };
        info!(%story_id, action = action.label(), "story publish state toggled");
        Ok(PublishToggle {
            story_id,
            is_published,
            action,
        })
    }

    /// Terminal: there is no undelete.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete(&self, story_id: Uuid, requester_id: Uuid) -> Result<()> {
        let story = self.owned_story(story_id, requester_id).await?;
        if story.is_expired(self.clock.now()) {
            return Err(DomainError::InvalidState("story has expired".into()));
        }
        self.stories.mark_deleted(story_id).await?;

        info!(%story_id, "story deleted");
        Ok(())
    }

    async fn owned_story(&self, story_id: Uuid, requester_id: Uuid) -> Result<Story> {
        let story = require_existing(self.stories.get(story_id).await?, story_id)?;
        ensure_owner(&story, requester_id)?;
        Ok(story)
    }
}
