//! Router-level tests over the in-memory adapters.

use std::sync::Arc;

use api_adapters::{build_router, ApiConfig, AppState};
use auth_adapters::DevTokenVerifier;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use domains::{Story, SystemClock, Visibility};
use serde_json::{json, Value};
use services::{Ports, StoryServices};
use storage_adapters::{InMemoryMediaStorage, InMemorySocialGraph, InMemoryStore};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "story-test-boundary";

struct Harness {
    router: Router,
    store: Arc<InMemoryStore>,
    graph: Arc<InMemorySocialGraph>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let graph = Arc::new(InMemorySocialGraph::new());
    let ports = Ports {
        stories: store.clone(),
        replies: store.clone(),
        ledger: store.clone(),
        friends: graph.clone(),
        blocks: graph.clone(),
        media: Arc::new(InMemoryMediaStorage::new()),
        clock: Arc::new(SystemClock),
    };
    let config = ApiConfig {
        max_upload_bytes: 1024,
        ..ApiConfig::default()
    };
    let state = AppState::new(
        StoryServices::new(ports),
        Arc::new(DevTokenVerifier::new()),
        config,
    );
    Harness {
        router: build_router(state),
        store,
        graph,
    }
}

fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {user}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn upload(router: &Router, user: Uuid, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/story")
        .header(header::AUTHORIZATION, format!("Bearer {user}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn create_story(router: &Router, user: Uuid, visibility: &str) -> Uuid {
    let body = multipart_body(&[
        ("file", Some(("photo.png", "image/png")), b"\x89PNG-bytes"),
        ("visibility", None, visibility.as_bytes()),
    ]);
    let (status, story) = upload(router, user, body).await;
    assert_eq!(status, StatusCode::CREATED, "{story}");
    story["id"].as_str().unwrap().parse().unwrap()
}

fn feed_ids(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn healthz_is_public() {
    let h = harness();
    let (status, body) = send(&h.router, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn story_routes_require_identity() {
    let h = harness();
    let (status, body) = send(&h.router, Method::GET, "/story", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_REQUIRED");

    let request = Request::builder()
        .uri("/story")
        .header(header::AUTHORIZATION, "Bearer not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creates_story_from_multipart() {
    let h = harness();
    let author = Uuid::new_v4();
    let body = multipart_body(&[
        ("file", Some(("clip.mp4", "video/mp4")), b"not-really-a-video"),
        ("location", None, b"  Lisbon  "),
        ("visibility", None, b"friends"),
    ]);

    let (status, story) = upload(&h.router, author, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(story["authorId"], author.to_string());
    assert_eq!(story["visibility"], "FRIENDS");
    assert_eq!(story["location"], "Lisbon");
    assert_eq!(story["viewCount"], 0);
    assert_eq!(story["isPublished"], true);
    assert!(story["media"].as_str().unwrap().starts_with("memory://"));
}

#[tokio::test]
async fn content_type_falls_back_to_filename() {
    let h = harness();
    let body = multipart_body(&[(
        "file",
        Some(("photo.jpg", "application/octet-stream")),
        b"jpeg-bytes",
    )]);
    let (status, story) = upload(&h.router, Uuid::new_v4(), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(story["media"].as_str().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn rejects_bad_uploads() {
    let h = harness();
    let user = Uuid::new_v4();

    let no_file = multipart_body(&[("location", None, b"home")]);
    let (status, body) = upload(&h.router, user, no_file).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let text = multipart_body(&[("file", Some(("notes.txt", "text/plain")), b"hello")]);
    let (status, _) = upload(&h.router, user, text).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_visibility = multipart_body(&[
        ("file", Some(("a.png", "image/png")), b"png"),
        ("visibility", None, b"everyone"),
    ]);
    let (status, _) = upload(&h.router, user, bad_visibility).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = vec![0u8; 2048];
    let too_big = multipart_body(&[("file", Some(("big.png", "image/png")), &oversized)]);
    let (status, body) = upload(&h.router, user, too_big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn feed_reflects_views_and_likes() {
    let h = harness();
    let author = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let story_id = create_story(&h.router, author, "PUBLIC").await;

    let (status, page) = send(&h.router, Method::GET, "/story", Some(viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed_ids(&page), vec![story_id.to_string()]);
    assert_eq!(page["items"][0]["viewedByMe"], false);
    assert_eq!(page["nextCursor"], Value::Null);

    let view_uri = format!("/story/view/{story_id}");
    let (_, first) = send(&h.router, Method::PATCH, &view_uri, Some(viewer), None).await;
    let (status, second) = send(&h.router, Method::PATCH, &view_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["firstView"], true);
    assert_eq!(second["firstView"], false);
    assert_eq!(second["viewCount"], 1);

    let like_uri = format!("/story/like/{story_id}");
    let (_, liked) = send(&h.router, Method::PATCH, &like_uri, Some(viewer), None).await;
    assert_eq!(liked["action"], "added");
    assert_eq!(liked["likeCount"], 1);

    let (_, page) = send(&h.router, Method::GET, "/story", Some(viewer), None).await;
    assert_eq!(page["items"][0]["viewedByMe"], true);
    assert_eq!(page["items"][0]["likedByMe"], true);

    let (_, unliked) = send(&h.router, Method::PATCH, &like_uri, Some(viewer), None).await;
    assert_eq!(unliked["action"], "removed");
    assert_eq!(unliked["likeCount"], 0);
    assert_eq!(h.store.like_rows(story_id), 0);
    assert_eq!(h.store.view_rows(story_id), 1);
}

#[tokio::test]
async fn friends_stories_need_an_active_friendship() {
    let h = harness();
    let author = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let story_id = create_story(&h.router, author, "FRIENDS").await;
    let story_uri = format!("/story/{story_id}");

    let (_, page) = send(&h.router, Method::GET, "/story", Some(viewer), None).await;
    assert!(feed_ids(&page).is_empty());
    let (status, _) = send(&h.router, Method::GET, &story_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.graph.befriend(author, viewer);
    let (_, page) = send(&h.router, Method::GET, "/story", Some(viewer), None).await;
    assert_eq!(feed_ids(&page), vec![story_id.to_string()]);
    let (status, item) = send(&h.router, Method::GET, &story_uri, Some(viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["remainingHours"], 23);
}

#[tokio::test]
async fn owner_only_mutations() {
    let h = harness();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let story_id = create_story(&h.router, owner, "PUBLIC").await;

    let uri = format!("/story/visibility/{story_id}");
    let body = json!({ "visibility": "PRIVATE" });
    let (status, err) = send(&h.router, Method::PATCH, &uri, Some(stranger), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["code"], "FORBIDDEN");

    let (status, story) = send(&h.router, Method::PATCH, &uri, Some(owner), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(story["visibility"], "PRIVATE");

    let (status, _) = send(
        &h.router,
        Method::PATCH,
        &uri,
        Some(owner),
        Some(json!({ "visibility": "SECRET" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let publish_uri = format!("/story/published/{story_id}");
    let (status, _) = send(&h.router, Method::PATCH, &publish_uri, Some(stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, toggle) = send(&h.router, Method::PATCH, &publish_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggle["isPublished"], false);
    assert_eq!(toggle["action"], "unpublished");

    let delete_uri = format!("/story/{story_id}");
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_story_cannot_be_toggled() {
    let h = harness();
    let owner = Uuid::new_v4();
    let created = Utc::now() - Duration::hours(30);
    let story = Story::new(owner, "m".into(), Visibility::Public, None, created);
    let story_id = story.id;
    h.store.put_story(story);

    let uri = format!("/story/published/{story_id}");
    let (status, body) = send(&h.router, Method::PATCH, &uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn reply_thread_round_trip() {
    let h = harness();
    let owner = Uuid::new_v4();
    let replier = Uuid::new_v4();
    let third = Uuid::new_v4();
    let story_id = create_story(&h.router, owner, "PUBLIC").await;

    let reply_uri = format!("/story/reply/{story_id}");
    let (status, _) = send(
        &h.router,
        Method::POST,
        &reply_uri,
        Some(replier),
        Some(json!({ "comment": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reply) = send(
        &h.router,
        Method::POST,
        &reply_uri,
        Some(replier),
        Some(json!({ "comment": "  nice view  " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["comment"], "nice view");
    let reply_id = reply["id"].as_str().unwrap().to_owned();

    let list_uri = format!("/story/replies/{story_id}");
    let (status, _) = send(&h.router, Method::GET, &list_uri, Some(replier), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, page) = send(&h.router, Method::GET, &list_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed_ids(&page), vec![reply_id.clone()]);

    let (_, mine) = send(&h.router, Method::GET, "/story/me", Some(owner), None).await;
    assert_eq!(mine["items"][0]["replies"][0]["id"], reply_id);

    let delete_uri = format!("/story/reply/{reply_id}");
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(third), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(replier), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.router, Method::DELETE, &delete_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_queries_are_validated_and_clamped() {
    let h = harness();
    let author = Uuid::new_v4();
    for _ in 0..3 {
        create_story(&h.router, author, "PUBLIC").await;
    }

    let (status, body) = send(&h.router, Method::GET, "/story?cursor=bogus", Some(author), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid cursor");

    let unknown = format!("/story?cursor={}", Uuid::new_v4());
    let (status, _) = send(&h.router, Method::GET, &unknown, Some(author), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = send(&h.router, Method::GET, "/story?limit=2", Some(author), None).await;
    assert_eq!(feed_ids(&page).len(), 2);
    let cursor = page["nextCursor"].as_str().unwrap().to_owned();
    let (_, rest) = send(
        &h.router,
        Method::GET,
        &format!("/story?limit=2&cursor={cursor}"),
        Some(author),
        None,
    )
    .await;
    assert_eq!(feed_ids(&rest).len(), 1);
    assert_eq!(rest["nextCursor"], Value::Null);

    let (_, all) = send(&h.router, Method::GET, "/story?limit=1000", Some(author), None).await;
    assert_eq!(feed_ids(&all).len(), 3);
}

#[tokio::test]
async fn metrics_and_request_ids() {
    let h = harness();
    let author = Uuid::new_v4();
    let story_id = create_story(&h.router, author, "PUBLIC").await;
    send(&h.router, Method::PATCH, &format!("/story/view/{story_id}"), Some(author), None).await;

    let response = h
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("stories_created_total 1"));
    assert!(text.contains("story_views_recorded_total{outcome=\"new\"} 1"));
}

#[tokio::test]
async fn unknown_routes_return_json_404() {
    let h = harness();
    let (status, body) = send(&h.router, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_path_and_query_use_json_envelope() {
    let h = harness();
    let user = Uuid::new_v4();

    let (status, body) = send(&h.router, Method::GET, "/story/not-a-uuid", Some(user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(body["message"].is_string());

    let (status, body) = send(&h.router, Method::GET, "/story?limit=abc", Some(user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let uri = format!("/story/replies/{}?limit=-", Uuid::new_v4());
    let (status, body) = send(&h.router, Method::GET, &uri, Some(user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}
