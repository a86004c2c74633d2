//! # Visibility Resolver
//!
//! Builds the access predicate for a viewer as plain data so that storage
//! adapters can evaluate it in memory or render it to SQL.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Story, Visibility};

/// One disjunct of the access predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessClause {
    /// `author = viewer`
    OwnContent(Uuid),
    /// `visibility = PUBLIC`
    Public,
    /// `visibility = FRIENDS AND author IN (..)`; never constructed empty
    FriendsOf(BTreeSet<Uuid>),
}

impl AccessClause {
    fn admits(&self, story: &Story) -> bool {
        match self {
            AccessClause::OwnContent(viewer) => story.author_id == *viewer,
            AccessClause::Public => story.visibility == Visibility::Public,
            AccessClause::FriendsOf(friends) => {
                story.visibility == Visibility::Friends && friends.contains(&story.author_id)
            }
        }
    }
}

/// Disjunction of access clauses minus the excluded authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPredicate {
    pub viewer_id: Uuid,
    pub any_of: Vec<AccessClause>,
    pub excluded_authors: BTreeSet<Uuid>,
}

/// Builds the predicate for `viewer_id`.
///
/// The FRIENDS clause is left out entirely when the viewer has no active
/// friends. The viewer is never excluded from their own content, even if the
/// block/mute collaborator lists them.
pub fn build_visibility_predicate(
    viewer_id: Uuid,
    friend_ids: &HashSet<Uuid>,
    blocked_ids: &HashSet<Uuid>,
) -> VisibilityPredicate {
    let mut any_of = vec![AccessClause::OwnContent(viewer_id), AccessClause::Public];

    let friends: BTreeSet<Uuid> = friend_ids
        .iter()
        .copied()
        .filter(|id| *id != viewer_id)
        .collect();
    if !friends.is_empty() {
        any_of.push(AccessClause::FriendsOf(friends));
    }

    let excluded_authors = blocked_ids
        .iter()
        .copied()
        .filter(|id| *id != viewer_id)
        .collect();

    VisibilityPredicate {
        viewer_id,
        any_of,
        excluded_authors,
    }
}

impl VisibilityPredicate {
    /// Friend ids of the FRIENDS clause, if present.
    pub fn friend_ids(&self) -> Option<&BTreeSet<Uuid>> {
        self.any_of.iter().find_map(|clause| match clause {
            AccessClause::FriendsOf(ids) => Some(ids),
            _ => None,
        })
    }

    /// Access clauses and exclusion only; liveness is checked separately.
    pub fn grants_access(&self, story: &Story) -> bool {
        !self.excluded_authors.contains(&story.author_id)
            && self.any_of.iter().any(|clause| clause.admits(story))
    }

    /// Full visibility invariant: live and granted.
    pub fn permits(&self, story: &Story, now: DateTime<Utc>) -> bool {
        story.is_live(now) && self.grants_access(story)
    }
}
