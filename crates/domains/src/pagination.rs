//! Cursor pagination primitives shared by the feed and reply listings.
//!
//! A cursor is the id of the last row a client received. Queries resume
//! strictly after that row in the listing's fixed key order, so inserts and
//! deletes of other rows never shift the window.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, Result};

/// Hard ceiling applied to every requested page size.
pub const MAX_PAGE_LIMIT: usize = 50;
pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: usize,
    cursor: Option<Uuid>,
}

impl PageRequest {
    /// Clamps `requested` into `1..=MAX_PAGE_LIMIT`, using `default` when absent.
    pub fn new(requested: Option<usize>, default: usize, cursor: Option<Uuid>) -> Self {
        let limit = requested.unwrap_or(default).clamp(1, MAX_PAGE_LIMIT);
        Self { limit, cursor }
    }

    pub fn first(limit: usize) -> Self {
        Self::new(Some(limit), DEFAULT_PAGE_LIMIT, None)
    }

    pub fn after(self, cursor: Option<Uuid>) -> Self {
        Self { cursor, ..self }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> Option<Uuid> {
        self.cursor
    }

    /// One extra row tells whether another page exists.
    pub fn fetch_size(&self) -> usize {
        self.limit + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, DEFAULT_PAGE_LIMIT, None)
    }
}

/// Parses an optional client-supplied cursor.
pub fn parse_cursor(raw: Option<&str>) -> Result<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| DomainError::InvalidInput("invalid cursor".into())),
    }
}

/// One page of results plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the listing is exhausted
    pub next_cursor: Option<Uuid>,
}

impl<T> Page<T> {
    /// Builds a page from `limit + 1` fetched rows. When the extra row is
    /// present it is dropped and the last row kept on the page becomes the
    /// cursor, so resuming after it yields the dropped row first.
    pub fn from_overfetch(mut rows: Vec<T>, limit: usize, id_of: impl Fn(&T) -> Uuid) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more { rows.last().map(&id_of) } else { None };
        Self {
            items: rows,
            next_cursor,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}
