//! # PostgreSQL adapter
//!
//! Maps the relational model in `migrations/` to the domain models. Ledger
//! units of work run at READ COMMITTED behind a `FOR UPDATE` lock on the
//! story row, so concurrent toggles on one story queue up behind each other.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AccessClause, AuthorQuery, BlockFilter, DomainError, EngagementLedger, FeedQuery,
    FriendshipGraph, LedgerKey, LedgerReceipt, LedgerSnapshot, LedgerWork, ReplyRepository,
    Result, RowChange, Story, StoryReply, StoryRepository, ViewerFlagMap, ViewerFlags, Visibility,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use tracing::{debug, error};
use uuid::Uuid;

const STORY_COLUMNS: &str = "id, author_id, media, location, visibility, created_at, expires_at, \
     is_published, is_deleted, view_count, like_count, trending_score";

const REPLY_COLUMNS: &str = "id, story_id, author_id, comment, created_at, is_deleted";

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Serialization failures, deadlocks and unique violations are retryable.
/// A racing first insert of a view or like row surfaces as 23505.
fn map_sqlx(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("40001" | "40P01" | "23505")) {
            return DomainError::Conflict(db.message().to_string());
        }
    }
    error!(error = %err, "database error");
    DomainError::storage(err)
}

#[derive(FromRow)]
struct StoryRow {
    id: Uuid,
    author_id: Uuid,
    media: String,
    location: Option<String>,
    visibility: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_published: bool,
    is_deleted: bool,
    view_count: i64,
    like_count: i64,
    trending_score: f64,
}

impl TryFrom<StoryRow> for Story {
    type Error = DomainError;

    fn try_from(row: StoryRow) -> Result<Self> {
        let visibility: Visibility = row
            .visibility
            .parse()
            .map_err(|_| DomainError::Storage(format!("story {} has bad visibility", row.id)))?;
        Ok(Story {
            id: row.id,
            author_id: row.author_id,
            media: row.media,
            location: row.location,
            visibility,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_published: row.is_published,
            is_deleted: row.is_deleted,
            view_count: row.view_count,
            like_count: row.like_count,
            trending_score: row.trending_score,
        })
    }
}

fn into_stories(rows: Vec<StoryRow>) -> Result<Vec<Story>> {
    rows.into_iter().map(Story::try_from).collect()
}

#[derive(FromRow)]
struct ReplyRow {
    id: Uuid,
    story_id: Uuid,
    author_id: Uuid,
    comment: String,
    created_at: DateTime<Utc>,
    is_deleted: bool,
}

impl From<ReplyRow> for StoryReply {
    fn from(row: ReplyRow) -> Self {
        StoryReply {
            id: row.id,
            story_id: row.story_id,
            author_id: row.author_id,
            comment: row.comment,
            created_at: row.created_at,
            is_deleted: row.is_deleted,
        }
    }
}

/// Stories, replies and the engagement ledger on one pool.
#[derive(Clone)]
pub struct PgStoryStore {
    pool: PgPool,
}

impl PgStoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sort key of the cursor row for the global feed.
    async fn rank_key(&self, cursor: Uuid) -> Result<(f64, DateTime<Utc>, Uuid)> {
        sqlx::query_as::<_, (f64, DateTime<Utc>, Uuid)>(
            "SELECT trending_score, created_at, id FROM stories WHERE id = $1",
        )
        .bind(cursor)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| DomainError::InvalidInput("invalid cursor".into()))
    }

    async fn recency_key(&self, cursor: Uuid) -> Result<(DateTime<Utc>, Uuid)> {
        sqlx::query_as::<_, (DateTime<Utc>, Uuid)>(
            "SELECT created_at, id FROM stories WHERE id = $1",
        )
        .bind(cursor)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| DomainError::InvalidInput("invalid cursor".into()))
    }

    async fn update_flag(&self, id: Uuid, sql: &'static str) -> Result<()> {
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::story_not_found(id));
        }
        Ok(())
    }

    async fn apply_row(
        tx: &mut Transaction<'_, Postgres>,
        table: &'static str,
        key: LedgerKey,
        change: RowChange,
    ) -> Result<()> {
        let sql = match change {
            RowChange::Keep => return Ok(()),
            RowChange::Insert => format!("INSERT INTO {table} (story_id, user_id) VALUES ($1, $2)"),
            RowChange::Remove => format!("DELETE FROM {table} WHERE story_id = $1 AND user_id = $2"),
        };
        sqlx::query(&sql)
            .bind(key.story_id)
            .bind(key.user_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl StoryRepository for PgStoryStore {
    async fn insert(&self, story: &Story) -> Result<()> {
        sqlx::query(
            "INSERT INTO stories (id, author_id, media, location, visibility, created_at, expires_at, \
             is_published, is_deleted, view_count, like_count, trending_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(story.id)
        .bind(story.author_id)
        .bind(&story.media)
        .bind(&story.location)
        .bind(story.visibility.as_str())
        .bind(story.created_at)
        .bind(story.expires_at)
        .bind(story.is_published)
        .bind(story.is_deleted)
        .bind(story.view_count)
        .bind(story.like_count)
        .bind(story.trending_score)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        let row: Option<StoryRow> =
            sqlx::query_as(&format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        row.map(Story::try_from).transpose()
    }

    async fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()> {
        let result = sqlx::query("UPDATE stories SET visibility = $2 WHERE id = $1")
            .bind(id)
            .bind(visibility.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::story_not_found(id));
        }
        Ok(())
    }

    async fn set_published(&self, id: Uuid, is_published: bool) -> Result<()> {
        let sql = if is_published {
            "UPDATE stories SET is_published = TRUE WHERE id = $1"
        } else {
            "UPDATE stories SET is_published = FALSE WHERE id = $1"
        };
        self.update_flag(id, sql).await
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<()> {
        self.update_flag(id, "UPDATE stories SET is_deleted = TRUE WHERE id = $1")
            .await
    }

    async fn feed_page(&self, query: &FeedQuery) -> Result<Vec<Story>> {
        let cursor_key = match query.cursor {
            Some(cursor) => Some(self.rank_key(cursor).await?),
            None => None,
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STORY_COLUMNS} FROM stories \
             WHERE is_deleted = FALSE AND is_published = TRUE AND expires_at >= "
        ));
        qb.push_bind(query.now);

        qb.push(" AND (");
        for (i, clause) in query.predicate.any_of.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            match clause {
                AccessClause::OwnContent(viewer) => {
                    qb.push("author_id = ").push_bind(*viewer);
                }
                AccessClause::Public => {
                    qb.push("visibility = 'PUBLIC'");
                }
                AccessClause::FriendsOf(friends) => {
                    let friends: Vec<Uuid> = friends.iter().copied().collect();
                    qb.push("(visibility = 'FRIENDS' AND author_id = ANY(")
                        .push_bind(friends)
                        .push("))");
                }
            }
        }
        qb.push(")");

        if !query.predicate.excluded_authors.is_empty() {
            let excluded: Vec<Uuid> = query.predicate.excluded_authors.iter().copied().collect();
            qb.push(" AND author_id <> ALL(").push_bind(excluded).push(")");
        }

        if let Some((score, created_at, id)) = cursor_key {
            qb.push(" AND (trending_score, created_at, id) < (")
                .push_bind(score)
                .push(", ")
                .push_bind(created_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }

        qb.push(" ORDER BY trending_score DESC, created_at DESC, id DESC LIMIT ")
            .push_bind(query.fetch as i64);

        let rows: Vec<StoryRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        debug!(rows = rows.len(), "feed page fetched");
        into_stories(rows)
    }

    async fn author_page(&self, query: &AuthorQuery) -> Result<Vec<Story>> {
        let cursor_key = match query.cursor {
            Some(cursor) => Some(self.recency_key(cursor).await?),
            None => None,
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE is_deleted = FALSE AND author_id = "
        ));
        qb.push_bind(query.author_id);
        if let Some((created_at, id)) = cursor_key {
            qb.push(" AND (created_at, id) < (")
                .push_bind(created_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(query.fetch as i64);

        let rows: Vec<StoryRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        into_stories(rows)
    }
}

#[async_trait]
impl ReplyRepository for PgStoryStore {
    async fn insert(&self, reply: &StoryReply) -> Result<()> {
        sqlx::query(
            "INSERT INTO story_replies (id, story_id, author_id, comment, created_at, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(reply.id)
        .bind(reply.story_id)
        .bind(reply.author_id)
        .bind(&reply.comment)
        .bind(reply.created_at)
        .bind(reply.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StoryReply>> {
        let row: Option<ReplyRow> =
            sqlx::query_as(&format!("SELECT {REPLY_COLUMNS} FROM story_replies WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(StoryReply::from))
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE story_replies SET is_deleted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::reply_not_found(id));
        }
        Ok(())
    }

    async fn story_page(
        &self,
        story_id: Uuid,
        cursor: Option<Uuid>,
        fetch: usize,
    ) -> Result<Vec<StoryReply>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {REPLY_COLUMNS} FROM story_replies WHERE is_deleted = FALSE AND story_id = "
        ));
        qb.push_bind(story_id);
        if let Some(cursor) = cursor {
            qb.push(" AND id < ").push_bind(cursor);
        }
        qb.push(" ORDER BY id DESC LIMIT ").push_bind(fetch as i64);

        let rows: Vec<ReplyRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(StoryReply::from).collect())
    }

    async fn live_for_stories(&self, story_ids: &[Uuid]) -> Result<Vec<StoryReply>> {
        let rows: Vec<ReplyRow> = sqlx::query_as(&format!(
            "SELECT {REPLY_COLUMNS} FROM story_replies \
             WHERE is_deleted = FALSE AND story_id = ANY($1) \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(story_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(StoryReply::from).collect())
    }
}

#[async_trait]
impl EngagementLedger for PgStoryStore {
    async fn run(&self, key: LedgerKey, work: &LedgerWork) -> Result<LedgerReceipt> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // The row lock queues writers on one story; the membership reads
        // below run after it is granted and see every committed toggle.
        let row: Option<StoryRow> = sqlx::query_as(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE id = $1 FOR UPDATE"
        ))
        .bind(key.story_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let (has_viewed, has_liked): (bool, bool) = sqlx::query_as(
            "SELECT \
               EXISTS (SELECT 1 FROM story_views WHERE story_id = $1 AND user_id = $2), \
               EXISTS (SELECT 1 FROM story_likes WHERE story_id = $1 AND user_id = $2)",
        )
        .bind(key.story_id)
        .bind(key.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let snapshot = LedgerSnapshot {
            story: row.map(Story::try_from).transpose()?,
            has_viewed,
            has_liked,
        };
        // Dropping `tx` on an early return rolls back.
        let plan = work(&snapshot)?;
        plan.check_against(&snapshot)?;
        let story = snapshot
            .story
            .as_ref()
            .ok_or_else(|| DomainError::story_not_found(key.story_id))?;

        if plan.is_noop() {
            tx.commit().await.map_err(map_sqlx)?;
            return Ok(LedgerReceipt {
                plan,
                view_count: story.view_count,
                like_count: story.like_count,
            });
        }

        Self::apply_row(&mut tx, "story_views", key, plan.view).await?;
        Self::apply_row(&mut tx, "story_likes", key, plan.like).await?;
        let (view_count, like_count): (i64, i64) = sqlx::query_as(
            "UPDATE stories \
             SET view_count = view_count + $2, like_count = like_count + $3 \
             WHERE id = $1 \
             RETURNING view_count, like_count",
        )
        .bind(key.story_id)
        .bind(plan.view.counter_delta())
        .bind(plan.like.counter_delta())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        debug!(story_id = %key.story_id, ?plan, "ledger transaction committed");
        Ok(LedgerReceipt {
            plan,
            view_count,
            like_count,
        })
    }

    async fn viewer_flags(&self, viewer_id: Uuid, story_ids: &[Uuid]) -> Result<ViewerFlagMap> {
        let rows: Vec<(Uuid, bool, bool)> = sqlx::query_as(
            "SELECT s.id, \
               EXISTS (SELECT 1 FROM story_views v WHERE v.story_id = s.id AND v.user_id = $1), \
               EXISTS (SELECT 1 FROM story_likes l WHERE l.story_id = s.id AND l.user_id = $1) \
             FROM UNNEST($2::uuid[]) AS s(id)",
        )
        .bind(viewer_id)
        .bind(story_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows
            .into_iter()
            .map(|(id, has_viewed, has_liked)| {
                (
                    id,
                    ViewerFlags {
                        has_viewed,
                        has_liked,
                    },
                )
            })
            .collect())
    }
}

/// Friendship and block/mute tables owned by neighbouring services.
#[derive(Clone)]
pub struct PgSocialGraph {
    pool: PgPool,
}

impl PgSocialGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendshipGraph for PgSocialGraph {
    async fn active_friends_of(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT CASE WHEN user_a = $1 THEN user_b ELSE user_a END \
             FROM friendships \
             WHERE (user_a = $1 OR user_b = $1) AND status = 'ACTIVE'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl BlockFilter for PgSocialGraph {
    async fn excluded_for(&self, viewer_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT target_id FROM user_exclusions WHERE actor_id = $1 \
             UNION \
             SELECT actor_id FROM user_exclusions WHERE target_id = $1 AND kind = 'block'",
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(ids.into_iter().collect())
    }
}
