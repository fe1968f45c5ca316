//! Database repository for recipes and their tag/ingredient links.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        recipes::{
            RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientDBRequest, RecipeIngredientDBResponse, RecipeUpdateDBRequest,
        },
        tags::TagDBResponse,
    },
};
use crate::types::{RecipeId, TagId, UserId};
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing recipes. Conditions are ANDed; `tag_slugs` match any of the slugs.
#[derive(Debug, Clone)]
pub struct RecipeFilter {
    pub skip: i64,
    pub limit: i64,
    pub author_id: Option<UserId>,
    pub tag_slugs: Vec<String>,
    /// Only recipes favorited by this user
    pub favorited_by: Option<UserId>,
    /// Only recipes in this user's shopping cart
    pub in_cart_of: Option<UserId>,
}

impl RecipeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            author_id: None,
            tag_slugs: Vec::new(),
            favorited_by: None,
            in_cart_of: None,
        }
    }

    fn push_conditions<'a>(&'a self, builder: &mut QueryBuilder<'a, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(author_id) = self.author_id {
            builder.push(" AND r.author_id = ").push_bind(author_id);
        }
        if !self.tag_slugs.is_empty() {
            // EXISTS keeps a recipe matching several slugs from appearing twice
            builder
                .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
                .push_bind(&self.tag_slugs)
                .push("))");
        }
        if let Some(user_id) = self.favorited_by {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorite_recipes f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(user_id) = self.in_cart_of {
            builder
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}

#[derive(FromRow)]
struct RecipeTagRow {
    recipe_id: RecipeId,
    id: TagId,
    name: String,
    slug: String,
}

#[derive(FromRow)]
struct AuthorCountRow {
    author_id: UserId,
    count: i64,
}

pub struct Recipes<'c> {
    db: &'c mut PgConnection,
}

/// Replace the tag and ingredient links of a recipe.
async fn replace_links(
    conn: &mut PgConnection,
    recipe_id: RecipeId,
    tag_ids: &[TagId],
    ingredients: &[RecipeIngredientDBRequest],
) -> Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, tag_id FROM UNNEST($2::bigint[]) AS tag_id")
        .bind(recipe_id)
        .bind(tag_ids)
        .execute(&mut *conn)
        .await?;

    let ingredient_ids: Vec<_> = ingredients.iter().map(|i| i.ingredient_id).collect();
    let amounts: Vec<_> = ingredients.iter().map(|i| i.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, i.ingredient_id, i.amount FROM UNNEST($2::bigint[], $3::int[]) AS i(ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl<'c> Recipes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Number of recipes matching the filter, ignoring `skip`/`limit`
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &RecipeFilter) -> Result<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
        filter.push_conditions(&mut builder);

        let count = builder.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Tags of each recipe, ordered by tag id
    #[instrument(skip(self, recipe_ids), fields(count = recipe_ids.len()), err)]
    pub async fn tags_for(&mut self, recipe_ids: &[RecipeId]) -> Result<HashMap<RecipeId, Vec<TagDBResponse>>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeTagRow>(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.slug
            FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result: HashMap<RecipeId, Vec<TagDBResponse>> = HashMap::new();
        for row in rows {
            result.entry(row.recipe_id).or_default().push(TagDBResponse {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
        }
        Ok(result)
    }

    /// Ingredients of each recipe with their amounts, in the order they were written
    #[instrument(skip(self, recipe_ids), fields(count = recipe_ids.len()), err)]
    pub async fn ingredients_for(&mut self, recipe_ids: &[RecipeId]) -> Result<HashMap<RecipeId, Vec<RecipeIngredientDBResponse>>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeIngredientDBResponse>(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result: HashMap<RecipeId, Vec<RecipeIngredientDBResponse>> = HashMap::new();
        for row in rows {
            result.entry(row.recipe_id).or_default().push(row);
        }
        Ok(result)
    }

    /// Newest recipes of each author, at most `per_author` each when given
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn latest_by_authors(
        &mut self,
        author_ids: &[UserId],
        per_author: Option<i64>,
    ) -> Result<HashMap<UserId, Vec<RecipeDBResponse>>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeDBResponse>(
            r#"
            SELECT * FROM (
                SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::bigint IS NULL OR position <= $2
            ORDER BY pub_date DESC, id DESC
            "#,
        )
        .bind(author_ids)
        .bind(per_author)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result: HashMap<UserId, Vec<RecipeDBResponse>> = HashMap::new();
        for recipe in rows {
            result.entry(recipe.author_id).or_default().push(recipe);
        }
        Ok(result)
    }

    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn count_by_authors(&mut self, author_ids: &[UserId]) -> Result<HashMap<UserId, i64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorCountRow>(
            "SELECT author_id, COUNT(*) AS count FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
        )
        .bind(author_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(|row| (row.author_id, row.count)).collect())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Recipes<'c> {
    type CreateRequest = RecipeCreateDBRequest;
    type UpdateRequest = RecipeUpdateDBRequest;
    type Response = RecipeDBResponse;
    type Id = RecipeId;
    type Filter = RecipeFilter;

    #[instrument(skip(self, request), fields(author_id = request.author_id, name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, RecipeDBResponse>(
            r#"
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.author_id)
        .bind(&request.name)
        .bind(&request.image)
        .bind(&request.text)
        .bind(request.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(&mut tx, recipe.id, &request.tag_ids, &request.ingredients).await?;

        tx.commit().await?;
        Ok(recipe)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let recipe = sqlx::query_as::<_, RecipeDBResponse>("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(recipe)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<RecipeId>) -> Result<HashMap<Self::Id, RecipeDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let recipes = sqlx::query_as::<_, RecipeDBResponse>("SELECT * FROM recipes WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(recipes.into_iter().map(|recipe| (recipe.id, recipe)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut builder = QueryBuilder::new("SELECT r.* FROM recipes r");
        filter.push_conditions(&mut builder);
        builder
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.skip);

        let recipes = builder.build_query_as::<RecipeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(recipes)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, RecipeDBResponse>(
            r#"
            UPDATE recipes SET
                name = COALESCE($2, name),
                text = COALESCE($3, text),
                image = COALESCE($4, image),
                cooking_time = COALESCE($5, cooking_time)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.text)
        .bind(&request.image)
        .bind(request.cooking_time)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        replace_links(&mut tx, recipe.id, &request.tag_ids, &request.ingredients).await?;

        tx.commit().await?;
        Ok(recipe)
    }
}
