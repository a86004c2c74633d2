//! # Engagement
//!
//! Idempotent view recording and like toggling on top of the
//! [`EngagementLedger`] unit of work. Transient conflicts are retried a
//! bounded number of times before surfacing as a storage failure.

use std::sync::Arc;

use domains::{
    Clock, DomainError, EngagementLedger, LedgerKey, LedgerPlan, LedgerReceipt, LedgerSnapshot,
    LedgerWork, Result, RowChange,
};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authz::require_live;

pub const MAX_LEDGER_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutcome {
    pub story_id: Uuid,
    pub view_count: i64,
    /// False when the viewer had already been counted
    pub first_view: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub story_id: Uuid,
    pub action: LikeAction,
    pub like_count: i64,
}

pub struct EngagementService {
    ledger: Arc<dyn EngagementLedger>,
    clock: Arc<dyn Clock>,
}

impl EngagementService {
    pub fn new(ledger: Arc<dyn EngagementLedger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Counts `user_id` once per story. Repeat calls succeed without effect,
    /// and a losing concurrent first call lands on the repeat path.
    #[tracing::instrument(skip(self))]
    pub async fn record_view(&self, story_id: Uuid, user_id: Uuid) -> Result<ViewOutcome> {
        let now = self.clock.now();
        let work = move |snapshot: &LedgerSnapshot| -> Result<LedgerPlan> {
            require_live(snapshot.story.as_ref(), story_id, now)?;
            if snapshot.has_viewed {
                Ok(LedgerPlan::noop())
            } else {
                Ok(LedgerPlan::insert_view())
            }
        };

        let receipt = self
            .run_with_retry(LedgerKey::new(story_id, user_id), &work)
            .await?;
        let first_view = receipt.plan.view == RowChange::Insert;
        debug!(%story_id, first_view, view_count = receipt.view_count, "view recorded");

        Ok(ViewOutcome {
            story_id,
            view_count: receipt.view_count,
            first_view,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn toggle_like(&self, story_id: Uuid, user_id: Uuid) -> Result<LikeOutcome> {
        let now = self.clock.now();
        let work = move |snapshot: &LedgerSnapshot| -> Result<LedgerPlan> {
            require_live(snapshot.story.as_ref(), story_id, now)?;
            if snapshot.has_liked {
                Ok(LedgerPlan::remove_like())
            } else {
                Ok(LedgerPlan::insert_like())
            }
        };

        let receipt = self
            .run_with_retry(LedgerKey::new(story_id, user_id), &work)
            .await?;
        let action = match receipt.plan.like {
            RowChange::Remove => LikeAction::Removed,
            _ => LikeAction::Added,
        };
        debug!(%story_id, ?action, like_count = receipt.like_count, "like toggled");

        Ok(LikeOutcome {
            story_id,
            action,
            like_count: receipt.like_count,
        })
    }

    async fn run_with_retry(&self, key: LedgerKey, work: &LedgerWork) -> Result<LedgerReceipt> {
        let mut attempt = 1;
        loop {
            match self.ledger.run(key, work).await {
                Err(err) if err.is_retryable() && attempt < MAX_LEDGER_ATTEMPTS => {
                    warn!(story_id = %key.story_id, attempt, error = %err, "ledger conflict, retrying");
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    warn!(story_id = %key.story_id, attempt, error = %err, "ledger conflict, giving up");
                    return Err(DomainError::Storage(format!(
                        "engagement update failed after {attempt} attempts"
                    )));
                }
                other => return other,
            }
        }
    }
}
