//! Content addressing shared by the media adapters.

use mime::Mime;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the payload; identical uploads share one key.
pub fn content_key(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Two-level shard prefix: "ab/cd".
pub fn shard_prefix(key: &str) -> String {
    format!("{}/{}", &key[0..2], &key[2..4])
}

/// Preferred file extension for a MIME type, if one is known. mime_guess
/// lists extensions alphabetically, so the common camera formats are pinned.
pub fn extension_for(content_type: &Mime) -> Option<&'static str> {
    match content_type.essence_str() {
        "image/jpeg" => Some("jpg"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        _ => mime_guess::get_mime_extensions(content_type).and_then(|exts| exts.first().copied()),
    }
}

/// "ab/cd/abcd….png"
pub fn relative_path(key: &str, content_type: &Mime) -> String {
    match extension_for(content_type) {
        Some(ext) => format!("{}/{key}.{ext}", shard_prefix(key)),
        None => format!("{}/{key}", shard_prefix(key)),
    }
}
