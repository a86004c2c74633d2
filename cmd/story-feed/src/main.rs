//! story-feed binary: loads settings, wires adapters into the services and
//! serves the HTTP API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_adapters::{build_router, ApiConfig, AppState};
use axum::Router;
use configs::{AuthMode, AuthSettings, LogSettings, MediaSettings, Settings};
use domains::{IdentityVerifier, MediaStorage, SystemClock};
use services::{Ports, StoryServices};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_logging(&settings.log);

    let media = build_media(&settings.media);
    let ports = build_ports(&settings, media).await?;
    let identity = build_identity(&settings.auth)?;

    let config = ApiConfig {
        default_page_size: settings.feed.default_page_size,
        max_upload_bytes: settings.media.max_upload_bytes,
        body_limit_bytes: settings.server.body_limit_bytes,
    };
    let state = AppState::new(StoryServices::new(ports), identity, config);

    let addr: SocketAddr = settings
        .server
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind_addr()))?;
    serve(addr, build_router(state)).await
}

fn init_logging(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
    info!(service = "story-feed", "logging initialized");
}

#[cfg(feature = "media-local")]
fn build_media(media: &MediaSettings) -> Arc<dyn MediaStorage> {
    info!(root = %media.root.display(), "storing media on local disk");
    Arc::new(storage_adapters::media_local::LocalMediaStorage::new(
        media.root.clone(),
        media.url_prefix.clone(),
    ))
}

#[cfg(not(feature = "media-local"))]
fn build_media(_media: &MediaSettings) -> Arc<dyn MediaStorage> {
    warn!("media-local disabled; uploads are kept in memory");
    Arc::new(storage_adapters::InMemoryMediaStorage::new())
}

#[cfg(feature = "db-postgres")]
async fn build_ports(settings: &Settings, media: Arc<dyn MediaStorage>) -> Result<Ports> {
    use secrecy::ExposeSecret;
    use storage_adapters::postgres::{connect, migrate, PgSocialGraph, PgStoryStore};

    let url = settings
        .database
        .url
        .as_ref()
        .context("database.url is required when built with db-postgres")?;
    let pool = connect(url.expose_secret(), settings.database.max_connections)
        .await
        .context("failed to connect to postgres")?;
    migrate(&pool).await.context("failed to run migrations")?;
    info!("connected to postgres");

    let store = Arc::new(PgStoryStore::new(pool.clone()));
    let graph = Arc::new(PgSocialGraph::new(pool));
    Ok(Ports {
        stories: store.clone(),
        replies: store.clone(),
        ledger: store,
        friends: graph.clone(),
        blocks: graph,
        media,
        clock: Arc::new(SystemClock),
    })
}

#[cfg(not(feature = "db-postgres"))]
async fn build_ports(_settings: &Settings, media: Arc<dyn MediaStorage>) -> Result<Ports> {
    use storage_adapters::{InMemorySocialGraph, InMemoryStore};

    warn!("db-postgres disabled; all data lives in memory");
    let store = Arc::new(InMemoryStore::new());
    let graph = Arc::new(InMemorySocialGraph::new());
    Ok(Ports {
        stories: store.clone(),
        replies: store.clone(),
        ledger: store,
        friends: graph.clone(),
        blocks: graph,
        media,
        clock: Arc::new(SystemClock),
    })
}

fn build_identity(auth: &AuthSettings) -> Result<Arc<dyn IdentityVerifier>> {
    match auth.mode {
        AuthMode::Dev => {
            warn!("auth.mode = dev: bearer tokens are raw user ids");
            Ok(Arc::new(auth_adapters::DevTokenVerifier::new()))
        }
        AuthMode::Jwt => jwt_verifier(auth),
    }
}

#[cfg(feature = "auth-jwt")]
fn jwt_verifier(auth: &AuthSettings) -> Result<Arc<dyn IdentityVerifier>> {
    use secrecy::ExposeSecret;

    let secret = auth
        .jwt_secret
        .as_ref()
        .context("auth.jwt_secret is required in jwt mode")?;
    Ok(Arc::new(auth_adapters::JwtVerifier::new(secret.expose_secret())))
}

#[cfg(not(feature = "auth-jwt"))]
fn jwt_verifier(_auth: &AuthSettings) -> Result<Arc<dyn IdentityVerifier>> {
    anyhow::bail!("auth.mode = jwt but the binary was built without the auth-jwt feature")
}

async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
