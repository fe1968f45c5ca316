//! Database repository for subscriptions (a user following an author).

use crate::db::{errors::Result, models::users::UserDBResponse};
use crate::types::UserId;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Follow an author. Returns false if already following.
    ///
    /// Following yourself is rejected by the `subscriptions_no_self_follow` check.
    #[instrument(skip(self), err)]
    pub async fn subscribe(&mut self, user_id: UserId, author_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT (user_id, author_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stop following an author. Returns false if not following.
    #[instrument(skip(self), err)]
    pub async fn unsubscribe(&mut self, user_id: UserId, author_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Which of `author_ids` the user follows
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn followed_among(&mut self, user_id: UserId, author_ids: &[UserId]) -> Result<HashSet<UserId>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = sqlx::query_scalar::<_, UserId>("SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)")
            .bind(user_id)
            .bind(author_ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids.into_iter().collect())
    }

    /// Authors the user follows, ordered by username
    #[instrument(skip(self), err)]
    pub async fn list_authors(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<UserDBResponse>> {
        let authors = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT u.* FROM subscriptions s
            JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY u.username, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(authors)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
