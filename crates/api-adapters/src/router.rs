use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::handlers;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    let stories = Router::new()
        .route("/story", post(handlers::create_story).get(handlers::get_stories))
        .route("/story/me", get(handlers::get_my_stories))
        .route(
            "/story/{id}",
            get(handlers::get_story).delete(handlers::delete_story),
        )
        .route("/story/visibility/{id}", patch(handlers::change_visibility))
        .route("/story/published/{id}", patch(handlers::toggle_published))
        .route("/story/view/{id}", patch(handlers::record_view))
        .route("/story/like/{id}", patch(handlers::toggle_like))
        .route(
            "/story/reply/{id}",
            post(handlers::add_reply).delete(handlers::delete_reply),
        )
        .route("/story/replies/{id}", get(handlers::get_replies));

    let ops = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics));

    let router = Router::new()
        .merge(stories)
        .merge(ops)
        .fallback(handlers::fallback)
        .with_state(state);

    apply_standard_layers(router, body_limit)
}

fn apply_standard_layers(router: Router, body_limit: usize) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(trace)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
