//! Database repository for tags.

use crate::db::{
    errors::Result,
    models::tags::{TagCreateDBRequest, TagDBResponse},
};
use crate::types::TagId;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

pub struct Tags<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tags<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<TagDBResponse>> {
        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags ORDER BY id")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tags)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: TagId) -> Result<Option<TagDBResponse>> {
        let tag = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tag)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_bulk(&mut self, ids: &[TagId]) -> Result<HashMap<TagId, TagDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tags.into_iter().map(|tag| (tag.id, tag)).collect())
    }

    /// Tags with any of `slugs`, keyed by slug.
    #[instrument(skip(self, slugs), fields(count = slugs.len()), err)]
    pub async fn get_by_slugs(&mut self, slugs: &[String]) -> Result<HashMap<String, TagDBResponse>> {
        if slugs.is_empty() {
            return Ok(HashMap::new());
        }

        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT id, name, slug FROM tags WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(tags.into_iter().map(|tag| (tag.slug.clone(), tag)).collect())
    }

    /// Insert a tag, or rename the existing tag with the same slug.
    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    pub async fn upsert(&mut self, request: &TagCreateDBRequest) -> Result<TagDBResponse> {
        let tag = sqlx::query_as::<_, TagDBResponse>(
            r#"
            INSERT INTO tags (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, slug
            "#,
        )
        .bind(&request.name)
        .bind(&request.slug)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(tag)
    }
}
