//! # configs
//!
//! Layered settings for the story-feed binary: built-in defaults, then an
//! optional `config/story-feed.toml`, then `STORY_FEED__*` environment
//! variables (`STORY_FEED__SERVER__PORT=9000`). A `.env` file is read first.

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "STORY_FEED";
pub const DEFAULT_CONFIG_FILE: &str = "config/story-feed";

/// Hard ceiling on page sizes; mirrors the pagination clamp in `domains`.
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub feed: FeedSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Cap on any request body, multipart uploads included
    pub body_limit_bytes: usize,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Only read when the binary is built with `db-postgres`
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Jwt,
    /// Bearer token is the raw user UUID. Never use outside development.
    Dev,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub mode: AuthMode,
    pub jwt_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub default_page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Settings {
    /// Reads `.env`, the default config file and the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_sources(Some(DEFAULT_CONFIG_FILE), None)
    }

    /// `env` replaces the process environment when given.
    pub fn from_sources(
        config_file: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.body_limit_bytes", 64 * 1024 * 1024)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.mode", "jwt")?
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("media.max_upload_bytes", 50 * 1024 * 1024)?
            .set_default("feed.default_page_size", 20)?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.server.port == 0 {
            return Err(SettingsError::Invalid("server.port must not be 0".into()));
        }
        if self.auth.mode == AuthMode::Jwt && self.auth.jwt_secret.is_none() {
            return Err(SettingsError::Invalid(
                "auth.jwt_secret is required when auth.mode = \"jwt\"".into(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.feed.default_page_size) {
            return Err(SettingsError::Invalid(format!(
                "feed.default_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.media.max_upload_bytes == 0 {
            return Err(SettingsError::Invalid(
                "media.max_upload_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
