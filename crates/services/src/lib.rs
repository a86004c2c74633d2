//! # services
//!
//! Use cases of the Story feed: lifecycle, feed composition, engagement and
//! reply threads. Each service takes its ports as `Arc<dyn _>` so the binary
//! can pick adapters at startup.

pub mod authz;
pub mod engagement;
pub mod feed;
pub mod lifecycle;
pub mod replies;

use std::sync::Arc;

use domains::{
    BlockFilter, Clock, EngagementLedger, FriendshipGraph, MediaStorage, ReplyRepository,
    StoryRepository,
};

pub use engagement::{EngagementService, LikeAction, LikeOutcome, ViewOutcome};
pub use feed::{FeedComposer, FeedItem, OwnStory};
pub use lifecycle::{NewStory, PublishAction, PublishToggle, StoryLifecycle};
pub use replies::ReplyThread;

/// Adapters the services are built from.
#[derive(Clone)]
pub struct Ports {
    pub stories: Arc<dyn StoryRepository>,
    pub replies: Arc<dyn ReplyRepository>,
    pub ledger: Arc<dyn EngagementLedger>,
    pub friends: Arc<dyn FriendshipGraph>,
    pub blocks: Arc<dyn BlockFilter>,
    pub media: Arc<dyn MediaStorage>,
    pub clock: Arc<dyn Clock>,
}

/// All Story use cases, cheap to clone into request handlers.
#[derive(Clone)]
pub struct StoryServices {
    pub lifecycle: Arc<StoryLifecycle>,
    pub feed: Arc<FeedComposer>,
    pub engagement: Arc<EngagementService>,
    pub replies: Arc<ReplyThread>,
}

impl StoryServices {
    pub fn new(ports: Ports) -> Self {
        Self {
            lifecycle: Arc::new(StoryLifecycle::new(
                ports.stories.clone(),
                ports.media.clone(),
                ports.clock.clone(),
            )),
            feed: Arc::new(FeedComposer::new(
                ports.stories.clone(),
                ports.replies.clone(),
                ports.ledger.clone(),
                ports.friends.clone(),
                ports.blocks.clone(),
                ports.clock.clone(),
            )),
            engagement: Arc::new(EngagementService::new(
                ports.ledger.clone(),
                ports.clock.clone(),
            )),
            replies: Arc::new(ReplyThread::new(
                ports.stories,
                ports.replies,
                ports.clock,
            )),
        }
    }
}
