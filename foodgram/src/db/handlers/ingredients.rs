//! Database repository for ingredients.

use crate::db::{
    errors::Result,
    models::ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
};
use crate::types::IngredientId;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing ingredients
#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub struct Ingredients<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Ingredients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(name = ?filter.name), err)]
    pub async fn list(&mut self, filter: &IngredientFilter) -> Result<Vec<IngredientDBResponse>> {
        let prefix = filter
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(escape_like);

        let ingredients = sqlx::query_as::<_, IngredientDBResponse>(
            r#"
            SELECT id, name, measurement_unit FROM ingredients
            WHERE $1::text IS NULL OR LOWER(name) LIKE LOWER($1) || '%'
            ORDER BY name, measurement_unit
            "#,
        )
        .bind(prefix)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ingredients)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: IngredientId) -> Result<Option<IngredientDBResponse>> {
        let ingredient =
            sqlx::query_as::<_, IngredientDBResponse>("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(ingredient)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_bulk(&mut self, ids: &[IngredientId]) -> Result<HashMap<IngredientId, IngredientDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ingredients =
            sqlx::query_as::<_, IngredientDBResponse>("SELECT id, name, measurement_unit FROM ingredients WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(ingredients.into_iter().map(|i| (i.id, i)).collect())
    }

    /// Insert an ingredient unless the same name and unit already exist.
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn upsert(&mut self, request: &IngredientCreateDBRequest) -> Result<IngredientDBResponse> {
        let ingredient = sqlx::query_as::<_, IngredientDBResponse>(
            r#"
            INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, measurement_unit
            "#,
        )
        .bind(&request.name)
        .bind(&request.measurement_unit)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(ingredient)
    }
}
