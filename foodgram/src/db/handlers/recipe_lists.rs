//! Database repository for per-user recipe lists: favorites and the shopping cart.
//!
//! Both lists are sets of `(user_id, recipe_id)` pairs with the same shape, so a single
//! repository serves both, parameterised by [`RecipeListKind`].

use crate::db::errors::Result;
use crate::types::{RecipeId, UserId};
use sqlx::{FromRow, PgConnection};
use std::collections::HashSet;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeListKind {
    Favorites,
    ShoppingCart,
}

impl RecipeListKind {
    fn table(self) -> &'static str {
        match self {
            RecipeListKind::Favorites => "favorite_recipes",
            RecipeListKind::ShoppingCart => "shopping_cart",
        }
    }

    /// How the list is named in user-facing messages
    pub fn display_name(self) -> &'static str {
        match self {
            RecipeListKind::Favorites => "favorites",
            RecipeListKind::ShoppingCart => "the shopping cart",
        }
    }
}

/// One ingredient line of a recipe on the list
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ListIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

pub struct RecipeLists<'c> {
    db: &'c mut PgConnection,
    kind: RecipeListKind,
}

impl<'c> RecipeLists<'c> {
    pub fn new(db: &'c mut PgConnection, kind: RecipeListKind) -> Self {
        Self { db, kind }
    }

    /// Add a recipe to the list. Returns false if it was already there.
    #[instrument(skip(self), fields(list = ?self.kind), err)]
    pub async fn add(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        let query = format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT (user_id, recipe_id) DO NOTHING",
            self.kind.table()
        );
        let result = sqlx::query(&query).bind(user_id).bind(recipe_id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a recipe from the list. Returns false if it was not there.
    #[instrument(skip(self), fields(list = ?self.kind), err)]
    pub async fn remove(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        let query = format!("DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2", self.kind.table());
        let result = sqlx::query(&query).bind(user_id).bind(recipe_id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Which of `recipe_ids` are on the user's list
    #[instrument(skip(self, recipe_ids), fields(list = ?self.kind, count = recipe_ids.len()), err)]
    pub async fn contains_among(&mut self, user_id: UserId, recipe_ids: &[RecipeId]) -> Result<HashSet<RecipeId>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let query = format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            self.kind.table()
        );
        let ids = sqlx::query_scalar::<_, RecipeId>(&query)
            .bind(user_id)
            .bind(recipe_ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids.into_iter().collect())
    }

    #[instrument(skip(self), fields(list = ?self.kind), err)]
    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE user_id = $1", self.kind.table());
        let count = sqlx::query_scalar::<_, i64>(&query).bind(user_id).fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Every ingredient line of every recipe on the list, unaggregated
    #[instrument(skip(self), fields(list = ?self.kind), err)]
    pub async fn ingredient_lines(&mut self, user_id: UserId) -> Result<Vec<ListIngredientRow>> {
        let query = format!(
            r#"
            SELECT i.name, i.measurement_unit, ri.amount
            FROM {} l
            JOIN recipe_ingredients ri ON ri.recipe_id = l.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE l.user_id = $1
            ORDER BY l.recipe_id, ri.id
            "#,
            self.kind.table()
        );
        let rows = sqlx::query_as::<_, ListIngredientRow>(&query)
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows)
    }
}
