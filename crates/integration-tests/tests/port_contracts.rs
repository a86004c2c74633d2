//! Feed composition against mocked collaborator ports.

use std::collections::HashSet;
use std::sync::Arc;

use domains::{
    DomainError, ManualClock, MockBlockFilter, MockFriendshipGraph, PageRequest, Visibility,
};
use integration_tests::TestApp;
use services::FeedComposer;
use uuid::Uuid;

fn composer(
    app: &TestApp,
    friends: MockFriendshipGraph,
    blocks: MockBlockFilter,
    clock: Arc<ManualClock>,
) -> FeedComposer {
    FeedComposer::new(
        app.store.clone(),
        app.store.clone(),
        app.store.clone(),
        Arc::new(friends),
        Arc::new(blocks),
        clock,
    )
}

#[tokio::test]
async fn collaborators_are_asked_once_per_feed_request() {
    let app = TestApp::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    let story = app.post_story(friend, Visibility::Friends).await;

    let mut friends = MockFriendshipGraph::new();
    friends
        .expect_active_friends_of()
        .withf(move |id| *id == viewer)
        .times(1)
        .returning(move |_| Ok(HashSet::from([friend])));
    let mut blocks = MockBlockFilter::new();
    blocks
        .expect_excluded_for()
        .times(1)
        .returning(|_| Ok(HashSet::new()));

    let feed = composer(&app, friends, blocks, app.clock.clone());
    let page = feed.get_stories(viewer, PageRequest::default()).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].story.id, story.id);
}

#[tokio::test]
async fn friendship_lookup_failures_surface_as_storage_errors() {
    let app = TestApp::new();
    app.post_story(Uuid::new_v4(), Visibility::Public).await;

    let mut friends = MockFriendshipGraph::new();
    friends
        .expect_active_friends_of()
        .returning(|_| Err(DomainError::Storage("friendship service down".into())));
    let mut blocks = MockBlockFilter::new();
    blocks.expect_excluded_for().never();

    let feed = composer(&app, friends, blocks, app.clock.clone());
    let err = feed
        .get_stories(Uuid::new_v4(), PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Storage(_)));
}

#[tokio::test]
async fn exclusions_from_the_block_filter_are_applied() {
    let app = TestApp::new();
    let viewer = Uuid::new_v4();
    let blocked = Uuid::new_v4();
    app.post_story(blocked, Visibility::Public).await;
    let kept = app.post_story(Uuid::new_v4(), Visibility::Public).await;

    let mut friends = MockFriendshipGraph::new();
    friends
        .expect_active_friends_of()
        .returning(|_| Ok(HashSet::new()));
    let mut blocks = MockBlockFilter::new();
    blocks
        .expect_excluded_for()
        .returning(move |_| Ok(HashSet::from([blocked, viewer])));

    let feed = composer(&app, friends, blocks, app.clock.clone());
    let page = feed.get_stories(viewer, PageRequest::default()).await.unwrap();
    let ids: Vec<Uuid> = page.items.iter().map(|i| i.story.id).collect();
    assert_eq!(ids, vec![kept.id]);
}
