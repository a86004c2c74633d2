//! Content-type resolution for multipart uploads.

use mime::Mime;

/// Prefers the part's declared type; falls back to the filename extension
/// when the client sent nothing useful.
pub fn resolve_content_type(declared: Option<&str>, filename: Option<&str>) -> Mime {
    let declared = declared
        .and_then(|value| value.parse::<Mime>().ok())
        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);
    if let Some(mime) = declared {
        return mime;
    }
    filename
        .and_then(|name| mime_guess::from_path(name).first())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
