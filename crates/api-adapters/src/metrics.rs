//! Prometheus counters for story activity, rendered in OpenMetrics text.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use services::{LikeAction, ViewOutcome};

pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ViewLabels {
    outcome: &'static str,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct LikeLabels {
    action: &'static str,
}

#[derive(Debug)]
pub struct StoryMetrics {
    registry: Registry,
    stories_created: Counter,
    views_recorded: Family<ViewLabels, Counter>,
    likes_toggled: Family<LikeLabels, Counter>,
    replies_created: Counter,
}

impl StoryMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let stories_created = Counter::default();
        let views_recorded = Family::<ViewLabels, Counter>::default();
        let likes_toggled = Family::<LikeLabels, Counter>::default();
        let replies_created = Counter::default();

        // Counters get the `_total` suffix on encode.
        registry.register("stories_created", "Stories created", stories_created.clone());
        registry.register(
            "story_views_recorded",
            "View calls by outcome",
            views_recorded.clone(),
        );
        registry.register(
            "story_likes_toggled",
            "Like toggles by resulting action",
            likes_toggled.clone(),
        );
        registry.register(
            "story_replies_created",
            "Replies added to stories",
            replies_created.clone(),
        );

        Self {
            registry,
            stories_created,
            views_recorded,
            likes_toggled,
            replies_created,
        }
    }

    pub fn story_created(&self) {
        self.stories_created.inc();
    }

    pub fn view_recorded(&self, outcome: &ViewOutcome) {
        let outcome = if outcome.first_view { "new" } else { "repeat" };
        self.views_recorded.get_or_create(&ViewLabels { outcome }).inc();
    }

    pub fn like_toggled(&self, action: LikeAction) {
        let action = match action {
            LikeAction::Added => "added",
            LikeAction::Removed => "removed",
        };
        self.likes_toggled.get_or_create(&LikeLabels { action }).inc();
    }

    pub fn reply_created(&self) {
        self.replies_created.inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for StoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}
