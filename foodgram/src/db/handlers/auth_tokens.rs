//! Database repository for token-auth keys.
//!
//! Every user has at most one key. Logging in again returns the existing key; logging out
//! deletes it, which signs the user out everywhere.

use crate::crypto::generate_token_key;
use crate::db::{errors::Result, models::users::UserDBResponse};
use crate::types::UserId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct AuthTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuthTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Return the user's key, creating one if they have none.
    #[instrument(skip(self), err)]
    pub async fn get_or_create(&mut self, user_id: UserId) -> Result<String> {
        sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(generate_token_key())
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        let key = sqlx::query_scalar::<_, String>("SELECT key FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(key)
    }

    /// Resolve a key to its owner.
    #[instrument(skip(self, key), err)]
    pub async fn get_user_by_key(&mut self, key: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT u.* FROM auth_tokens t JOIN users u ON u.id = t.user_id WHERE t.key = $1",
        )
        .bind(key)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_user(conn: &mut PgConnection) -> UserId {
        Users::new(conn)
            .create(&UserCreateDBRequest {
                email: "token@example.com".to_string(),
                username: "token".to_string(),
                first_name: "Token".to_string(),
                last_name: "Holder".to_string(),
                password_hash: "hash".to_string(),
                is_admin: false,
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_token_lifecycle(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn).await;
        let mut tokens = AuthTokens::new(&mut conn);

        let key = tokens.get_or_create(user_id).await.unwrap();
        assert_eq!(key.len(), crate::crypto::TOKEN_KEY_LENGTH);

        // Stable across logins
        assert_eq!(tokens.get_or_create(user_id).await.unwrap(), key);

        let owner = tokens.get_user_by_key(&key).await.unwrap().unwrap();
        assert_eq!(owner.id, user_id);

        assert!(tokens.delete_for_user(user_id).await.unwrap());
        assert!(tokens.get_user_by_key(&key).await.unwrap().is_none());
        assert!(!tokens.delete_for_user(user_id).await.unwrap());

        // A fresh login issues a new key
        assert_ne!(tokens.get_or_create(user_id).await.unwrap(), key);
    }
}
