//! Upload payloads crossing the MediaStorage port.

use bytes::Bytes;
use mime::Mime;

use crate::error::{DomainError, Result};

/// Raw upload as received from the transport.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: Option<String>,
    pub content_type: Mime,
    pub data: Bytes,
}

/// Whether the upload is a photo or a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaUpload {
    /// Accepts only non-empty `image/*` and `video/*` payloads.
    pub fn validate(&self) -> Result<MediaKind> {
        let kind = if self.content_type.type_() == mime::IMAGE {
            MediaKind::Image
        } else if self.content_type.type_() == mime::VIDEO {
            MediaKind::Video
        } else {
            return Err(DomainError::InvalidInput(format!(
                "unsupported media type '{}', expected image/* or video/*",
                self.content_type
            )));
        };
        if self.data.is_empty() {
            return Err(DomainError::InvalidInput("uploaded file is empty".into()));
        }
        Ok(kind)
    }
}

/// Where the MediaStorage port put an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Storage key (content hash for the local adapter)
    pub key: String,
    /// Reference persisted on the story
    pub url: String,
}
