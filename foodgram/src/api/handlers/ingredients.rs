use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::{
        extract::QueryParams,
        models::ingredients::{IngredientQuery, IngredientResponse},
    },
    db::handlers::{Ingredients, ingredients::IngredientFilter},
    errors::{Error, Result},
    types::IngredientId,
};

/// List ingredients, optionally by name prefix
#[utoipa::path(
    get,
    path = "/api/ingredients/",
    tag = "ingredients",
    summary = "List ingredients",
    params(IngredientQuery),
    responses(
        (status = 200, description = "Matching ingredients", body = Vec<IngredientResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<IngredientQuery>,
) -> Result<Json<Vec<IngredientResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredients = Ingredients::new(&mut pool_conn)
        .list(&IngredientFilter { name: query.name })
        .await?;

    Ok(Json(ingredients.into_iter().map(IngredientResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/ingredients/{id}/",
    tag = "ingredients",
    summary = "Get ingredient",
    params(("id" = i64, Path, description = "Ingredient ID")),
    responses(
        (status = 200, description = "Ingredient", body = IngredientResponse),
        (status = 404, description = "Ingredient not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_ingredient(State(state): State<AppState>, Path(id): Path<IngredientId>) -> Result<Json<IngredientResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredient = Ingredients::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient", id))?;

    Ok(Json(IngredientResponse::from(ingredient)))
}
