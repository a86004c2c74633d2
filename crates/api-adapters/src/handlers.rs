//! Axum handlers. Each one extracts the viewer, delegates to a service and
//! records the matching counter.

use axum::extract::multipart::Field;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::BytesMut;
use domains::{DomainError, MediaUpload, Page, Story, StoryReply, Visibility};
use services::{FeedItem, LikeOutcome, NewStory, OwnStory, PublishToggle, ViewOutcome};
use tracing::{debug, error};
use uuid::Uuid;

use crate::dto::{HealthStatus, ListQuery, ReplyBody, VisibilityBody};
use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::metrics::OPENMETRICS_CONTENT_TYPE;
use crate::state::AppState;
use crate::upload::resolve_content_type;

pub async fn healthz() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render().map_err(|err| {
        error!(error = %err, "failed to encode metrics");
        ApiError::internal()
    })?;
    Ok(([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body))
}

/// `POST /story` with multipart fields `file`, `location`, `visibility`.
pub async fn create_story(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Story>)> {
    let mut request = NewStory::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                request.upload = Some(read_upload(field, state.config.max_upload_bytes).await?);
            }
            "location" => {
                request.location = Some(field.text().await?);
            }
            "visibility" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    request.visibility = Some(raw.parse::<Visibility>()?);
                }
            }
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let story = state.services.lifecycle.create(user_id, request).await?;
    state.metrics.story_created();
    Ok((StatusCode::CREATED, Json(story)))
}

async fn read_upload(mut field: Field<'_>, max_bytes: usize) -> ApiResult<MediaUpload> {
    let filename = field.file_name().map(str::to_owned);
    let content_type = resolve_content_type(field.content_type(), filename.as_deref());

    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > max_bytes {
            return Err(ApiError::payload_too_large(max_bytes));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(MediaUpload {
        filename,
        content_type,
        data: data.freeze(),
    })
}

pub async fn change_visibility(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<VisibilityBody>, JsonRejection>,
) -> ApiResult<Json<Story>> {
    let Path(story_id) = path?;
    let Json(body) = body?;
    let visibility: Visibility = body.visibility.parse()?;
    let story = state
        .services
        .lifecycle
        .change_visibility(story_id, user_id, visibility)
        .await?;
    Ok(Json(story))
}

pub async fn toggle_published(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PublishToggle>> {
    let Path(story_id) = path?;
    let toggle = state
        .services
        .lifecycle
        .toggle_published(story_id, user_id)
        .await?;
    Ok(Json(toggle))
}

pub async fn delete_story(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(story_id) = path?;
    state.services.lifecycle.soft_delete(story_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_view(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ViewOutcome>> {
    let Path(story_id) = path?;
    let outcome = state
        .services
        .engagement
        .record_view(story_id, user_id)
        .await?;
    state.metrics.view_recorded(&outcome);
    Ok(Json(outcome))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<LikeOutcome>> {
    let Path(story_id) = path?;
    let outcome = state
        .services
        .engagement
        .toggle_like(story_id, user_id)
        .await?;
    state.metrics.like_toggled(outcome.action);
    Ok(Json(outcome))
}

pub async fn get_stories(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<FeedItem>>> {
    let Query(query) = query?;
    let page = query.page_request(state.config.default_page_size)?;
    let stories = state.services.feed.get_stories(user_id, page).await?;
    Ok(Json(stories))
}

pub async fn get_story(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<FeedItem>> {
    let Path(story_id) = path?;
    let story = state.services.feed.get_story(user_id, story_id).await?;
    Ok(Json(story))
}

pub async fn get_my_stories(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<OwnStory>>> {
    let Query(query) = query?;
    let page = query.page_request(state.config.default_page_size)?;
    let stories = state.services.feed.get_my_stories(user_id, page).await?;
    Ok(Json(stories))
}

pub async fn add_reply(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReplyBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StoryReply>)> {
    let Path(story_id) = path?;
    let Json(body) = body?;
    let reply = state
        .services
        .replies
        .add_reply(story_id, user_id, &body.comment)
        .await?;
    state.metrics.reply_created();
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn get_replies(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<StoryReply>>> {
    let Path(story_id) = path?;
    let Query(query) = query?;
    let page = query.page_request(state.config.default_page_size)?;
    let replies = state
        .services
        .replies
        .get_replies(story_id, user_id, page)
        .await?;
    Ok(Json(replies))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(reply_id) = path?;
    state.services.replies.delete_reply(reply_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// JSON 404 for unmatched routes.
pub async fn fallback() -> ApiError {
    ApiError::from(DomainError::NotFound("route", "unknown".into()))
}
