use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One ingredient line of a recipe write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIngredientDBRequest {
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

/// Database request for creating a recipe together with its tag and ingredient links
#[derive(Debug, Clone)]
pub struct RecipeCreateDBRequest {
    pub author_id: UserId,
    pub name: String,
    pub text: String,
    /// Media path of the already stored image
    pub image: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientDBRequest>,
}

/// Database request for updating a recipe. `None` keeps the current value; the link sets are
/// always replaced.
#[derive(Debug, Clone)]
pub struct RecipeUpdateDBRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    /// New media path
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tag_ids: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientDBRequest>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RecipeDBResponse {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// An ingredient as used by a recipe, with the recipe's amount
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeIngredientDBResponse {
    pub recipe_id: RecipeId,
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}
