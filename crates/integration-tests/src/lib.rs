//! Shared harness for the end-to-end tests: every port backed by the
//! in-memory adapters and a clock the tests move by hand.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use domains::{
    ManualClock, MediaUpload, PageRequest, Result, Story, StoryRepository, Visibility,
};
use services::{NewStory, Ports, StoryServices};
use storage_adapters::{InMemoryMediaStorage, InMemorySocialGraph, InMemoryStore};
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub graph: Arc<InMemorySocialGraph>,
    pub media: Arc<InMemoryMediaStorage>,
    pub clock: Arc<ManualClock>,
    pub services: StoryServices,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let graph = Arc::new(InMemorySocialGraph::new());
        let media = Arc::new(InMemoryMediaStorage::new());
        let clock = Arc::new(ManualClock::default());
        let services = StoryServices::new(Ports {
            stories: store.clone(),
            replies: store.clone(),
            ledger: store.clone(),
            friends: graph.clone(),
            blocks: graph.clone(),
            media: media.clone(),
            clock: clock.clone(),
        });
        Self {
            store,
            graph,
            media,
            clock,
            services,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        domains::Clock::now(&*self.clock)
    }

    /// Creates a story through the lifecycle service with a small PNG.
    pub async fn post_story(&self, author: Uuid, visibility: Visibility) -> Story {
        let request = NewStory {
            upload: Some(png()),
            visibility: Some(visibility),
            location: None,
        };
        self.services
            .lifecycle
            .create(author, request)
            .await
            .expect("story creation should succeed")
    }

    /// Current persisted row, soft-deleted or not.
    pub async fn story(&self, id: Uuid) -> Story {
        StoryRepository::get(&*self.store, id)
            .await
            .expect("store read")
            .expect("story row exists")
    }

    /// Walks every feed page via `nextCursor` and returns the ids in order.
    pub async fn walk_feed(&self, viewer: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut page = PageRequest::first(limit);
        loop {
            let result = self.services.feed.get_stories(viewer, page).await?;
            ids.extend(result.items.iter().map(|item| item.story.id));
            match result.next_cursor {
                Some(cursor) => page = page.after(Some(cursor)),
                None => return Ok(ids),
            }
        }
    }

    pub async fn feed_ids(&self, viewer: Uuid) -> Vec<Uuid> {
        self.walk_feed(viewer, domains::MAX_PAGE_LIMIT)
            .await
            .expect("feed read")
    }

    #[cfg(feature = "web-axum")]
    pub fn router(&self) -> axum::Router {
        use api_adapters::{build_router, ApiConfig, AppState};

        let state = AppState::new(
            self.services.clone(),
            Arc::new(auth_adapters::DevTokenVerifier::new()),
            ApiConfig::default(),
        );
        build_router(state)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

pub fn png() -> MediaUpload {
    MediaUpload {
        filename: Some("story.png".into()),
        content_type: mime::IMAGE_PNG,
        data: Bytes::from_static(b"\x89PNG\r\n\x1a\n-test"),
    }
}
