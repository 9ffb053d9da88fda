//! Subscription repository for feedrelay.

use chrono::Utc;

use super::types::FeedSubscription;
use crate::db::{parse_datetime, DbPool};
use crate::{RelayError, Result};

/// Row type for a subscription from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedSubscriptionRow {
    id: i64,
    group_id: i64,
    channel_id: i64,
    url: String,
    created_at: String,
}

impl From<FeedSubscriptionRow> for FeedSubscription {
    fn from(row: FeedSubscriptionRow) -> Self {
        FeedSubscription {
            id: row.id,
            group_id: row.group_id,
            channel_id: row.channel_id,
            url: row.url,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for subscription persistence.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a subscription. `url` must already be normalized.
    ///
    /// Fails with a validation error if the group already subscribes to `url`.
    pub async fn create(
        &self,
        group_id: i64,
        channel_id: i64,
        url: &str,
    ) -> Result<FeedSubscription> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feed_subscriptions (group_id, channel_id, url)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(group_id)
        .bind(channel_id)
        .bind(url)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_insert_error(e, group_id, url))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| RelayError::NotFound("subscription".into()))
    }

    /// Create a subscription unless the group already holds `limit`.
    ///
    /// The count and the insert run as one statement, so concurrent calls
    /// cannot push a group past its limit. Returns `None` when the group is
    /// full. Fails with a validation error if the group already subscribes
    /// to `url`.
    pub async fn create_within_limit(
        &self,
        group_id: i64,
        channel_id: i64,
        url: &str,
        limit: usize,
    ) -> Result<Option<FeedSubscription>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO feed_subscriptions (group_id, channel_id, url)
            SELECT $1, $2, $3
            WHERE (SELECT COUNT(*) FROM feed_subscriptions WHERE group_id = $1) < $4
            RETURNING id
            "#,
        )
        .bind(group_id)
        .bind(channel_id)
        .bind(url)
        .bind(limit)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_insert_error(e, group_id, url))?;

        let Some(id) = id else {
            return Ok(None);
        };
        self.get_by_id(id).await
    }

    /// Get a subscription by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FeedSubscription>> {
        let row = sqlx::query_as::<_, FeedSubscriptionRow>(
            r#"
            SELECT id, group_id, channel_id, url, created_at
            FROM feed_subscriptions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FeedSubscription::from))
    }

    /// List every subscription (ordered by creation).
    pub async fn list_all(&self) -> Result<Vec<FeedSubscription>> {
        let rows = sqlx::query_as::<_, FeedSubscriptionRow>(
            r#"
            SELECT id, group_id, channel_id, url, created_at
            FROM feed_subscriptions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedSubscription::from).collect())
    }

    /// List a group's subscriptions (ordered by creation).
    pub async fn list_by_group(&self, group_id: i64) -> Result<Vec<FeedSubscription>> {
        let rows = sqlx::query_as::<_, FeedSubscriptionRow>(
            r#"
            SELECT id, group_id, channel_id, url, created_at
            FROM feed_subscriptions
            WHERE group_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedSubscription::from).collect())
    }

    /// Delete a subscription. Returns true if a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_subscriptions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Map an insert failure, turning a unique violation into a validation error.
fn map_insert_error(e: sqlx::Error, group_id: i64, url: &str) -> RelayError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RelayError::Validation(format!(
            "group {} is already subscribed to {}",
            group_id, url
        )),
        _ => RelayError::Database(e.to_string()),
    }
}
