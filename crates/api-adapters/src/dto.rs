//! Request and response bodies that are not domain models themselves.

use domains::{parse_cursor, PageRequest, Result};
use serde::{Deserialize, Serialize};

/// `?limit=&cursor=` on every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl ListQuery {
    /// Negative and zero limits clamp to one row; an unparsable cursor is
    /// `InvalidInput`.
    pub fn page_request(&self, default_limit: usize) -> Result<PageRequest> {
        let cursor = parse_cursor(self.cursor.as_deref())?;
        let limit = self.limit.map(|l| usize::try_from(l).unwrap_or(0));
        Ok(PageRequest::new(limit, default_limit, cursor))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityBody {
    pub visibility: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyBody {
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}
