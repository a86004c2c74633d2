//! Local filesystem implementation of `MediaStorage`.
//! Content-addressable storage with directory sharding; uploads with the same
//! bytes are stored once.

use std::path::PathBuf;

use async_trait::async_trait;
use domains::{DomainError, MediaStorage, MediaUpload, Result, StoredMedia};
use tokio::fs;
use tracing::{debug, error};

use crate::content::{content_key, relative_path};

pub struct LocalMediaStorage {
    /// Root directory for all uploads (e.g. "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g. "/media")
    url_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store(&self, upload: MediaUpload) -> Result<StoredMedia> {
        let key = content_key(&upload.data);
        let rel_path = relative_path(&key, &upload.content_type);
        let target = self.root_path.join(&rel_path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                error!(path = %parent.display(), error = %err, "cannot create media directory");
                DomainError::storage(err)
            })?;
        }

        let exists = fs::try_exists(&target).await.map_err(DomainError::storage)?;
        if !exists {
            fs::write(&target, &upload.data).await.map_err(|err| {
                error!(path = %target.display(), error = %err, "cannot write media file");
                DomainError::storage(err)
            })?;
            debug!(%key, bytes = upload.data.len(), "media stored");
        }

        Ok(StoredMedia {
            url: format!("{}/{}", self.url_prefix, rel_path),
            key,
        })
    }
}
