//! # Engagement Ledger unit of work
//!
//! A ledger operation reads a [`LedgerSnapshot`] for one `(story, user)` pair,
//! hands it to a [`LedgerWork`] closure that decides a [`LedgerPlan`], and the
//! store applies the plan's row changes together with the matching counter
//! deltas in one atomic step. Counters are only ever moved by row changes, so
//! `view_count`/`like_count` always equal the number of ledger rows.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::models::Story;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub story_id: Uuid,
    pub user_id: Uuid,
}

impl LedgerKey {
    pub fn new(story_id: Uuid, user_id: Uuid) -> Self {
        Self { story_id, user_id }
    }
}

/// State read inside the unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    /// `None` when no story row exists at all
    pub story: Option<Story>,
    pub has_viewed: bool,
    pub has_liked: bool,
}

/// Mutation of one ledger row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowChange {
    #[default]
    Keep,
    Insert,
    Remove,
}

impl RowChange {
    pub fn counter_delta(self) -> i64 {
        match self {
            RowChange::Keep => 0,
            RowChange::Insert => 1,
            RowChange::Remove => -1,
        }
    }

    fn consistent_with(self, row_exists: bool) -> bool {
        match self {
            RowChange::Keep => true,
            RowChange::Insert => !row_exists,
            RowChange::Remove => row_exists,
        }
    }
}

/// What a unit of work wants written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerPlan {
    pub view: RowChange,
    pub like: RowChange,
}

impl LedgerPlan {
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn insert_view() -> Self {
        Self {
            view: RowChange::Insert,
            ..Self::default()
        }
    }

    pub fn insert_like() -> Self {
        Self {
            like: RowChange::Insert,
            ..Self::default()
        }
    }

    pub fn remove_like() -> Self {
        Self {
            like: RowChange::Remove,
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.view == RowChange::Keep && self.like == RowChange::Keep
    }

    /// Rejects plans that would insert an existing row or remove a missing
    /// one. Stores call this before applying anything.
    pub fn check_against(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if self.view.consistent_with(snapshot.has_viewed)
            && self.like.consistent_with(snapshot.has_liked)
        {
            Ok(())
        } else {
            Err(DomainError::Conflict(
                "ledger plan does not match current rows".into(),
            ))
        }
    }
}

/// Result of a committed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub plan: LedgerPlan,
    pub view_count: i64,
    pub like_count: i64,
}

/// Read-then-decide closure run inside the store's transaction. It may be
/// invoked more than once when the store retries internally.
pub type LedgerWork = dyn Fn(&LedgerSnapshot) -> Result<LedgerPlan> + Send + Sync;

/// Per-viewer engagement facts used to decorate feed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    pub has_viewed: bool,
    pub has_liked: bool,
}

pub type ViewerFlagMap = HashMap<Uuid, ViewerFlags>;
