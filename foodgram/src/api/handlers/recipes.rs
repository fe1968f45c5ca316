use axum::{
    Json,
    extract::{OriginalUri, Path, RawQuery, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use sqlx::PgConnection;
use std::collections::HashSet;

use crate::{
    AppState,
    api::{
        extract::{JsonBody, QueryParams},
        models::{
            ingredients::RecipeIngredientResponse,
            pagination::PaginatedResponse,
            recipes::{
                DownloadQuery, RecipeListParams, RecipeListQuery, RecipeResponse, RecipeShortResponse, RecipeWrite, RecipeWriteMode,
                ShortLinkResponse, ValidatedRecipe,
            },
            tags::TagResponse,
            users::{CurrentUser, UserResponse},
        },
    },
    auth::{current_user::MaybeCurrentUser, permissions::require_owner_or_admin},
    config::Config,
    db::{
        handlers::{Ingredients, RecipeListKind, RecipeLists, Recipes, Repository, Subscriptions, Tags, Users, recipes::RecipeFilter},
        models::recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeUpdateDBRequest},
    },
    errors::{Error, FieldErrors, NON_FIELD_ERRORS, Result, add_field_error},
    media::{self, MediaKind},
    shopping_list, short_link,
    types::{Operation, RecipeId, Resource, UserId},
};

/// Build full representations of `recipes` as seen by `viewer`, keeping their order.
///
/// Links, authors and the viewer's flags are loaded in bulk, one query each.
pub(crate) async fn recipe_responses(
    conn: &mut PgConnection,
    recipes: Vec<RecipeDBResponse>,
    viewer: Option<UserId>,
    config: &Config,
) -> Result<Vec<RecipeResponse>> {
    let recipe_ids: Vec<RecipeId> = recipes.iter().map(|recipe| recipe.id).collect();
    let author_ids: Vec<UserId> = recipes
        .iter()
        .map(|recipe| recipe.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tags = Recipes::new(&mut *conn).tags_for(&recipe_ids).await?;
    let mut ingredients = Recipes::new(&mut *conn).ingredients_for(&recipe_ids).await?;
    let authors = Users::new(&mut *conn).get_bulk(author_ids.clone()).await?;

    let (followed, favorited, in_cart) = match viewer {
        Some(viewer_id) => (
            Subscriptions::new(&mut *conn).followed_among(viewer_id, &author_ids).await?,
            RecipeLists::new(&mut *conn, RecipeListKind::Favorites)
                .contains_among(viewer_id, &recipe_ids)
                .await?,
            RecipeLists::new(&mut *conn, RecipeListKind::ShoppingCart)
                .contains_among(viewer_id, &recipe_ids)
                .await?,
        ),
        None => (HashSet::new(), HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| Error::Internal {
                operation: format!("load author {} of recipe {}", recipe.author_id, recipe.id),
            })?;
            let is_subscribed = followed.contains(&author.id);

            Ok(RecipeResponse {
                id: recipe.id,
                tags: tags
                    .remove(&recipe.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(TagResponse::from)
                    .collect(),
                author: UserResponse::new(author, is_subscribed, config),
                ingredients: ingredients
                    .remove(&recipe.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(RecipeIngredientResponse::from)
                    .collect(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                image: media::media_url(config, &recipe.image),
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

async fn recipe_response(
    conn: &mut PgConnection,
    recipe: RecipeDBResponse,
    viewer: Option<UserId>,
    config: &Config,
) -> Result<RecipeResponse> {
    recipe_responses(conn, vec![recipe], viewer, config)
        .await?
        .pop()
        .ok_or_else(|| Error::Internal {
            operation: "build recipe response".to_string(),
        })
}

/// Reject writes that reference tags or ingredients missing from the catalog
async fn check_references(conn: &mut PgConnection, recipe: &ValidatedRecipe) -> Result<()> {
    let mut errors = FieldErrors::new();

    let tags = Tags::new(&mut *conn).get_bulk(&recipe.tag_ids).await?;
    for id in recipe.tag_ids.iter().filter(|id| !tags.contains_key(id)) {
        add_field_error(&mut errors, "tags", format!("Invalid pk \"{id}\" - object does not exist."));
    }

    let ingredient_ids: Vec<_> = recipe.ingredients.iter().map(|line| line.ingredient_id).collect();
    let ingredients = Ingredients::new(&mut *conn).get_bulk(&ingredient_ids).await?;
    for id in ingredient_ids.iter().filter(|id| !ingredients.contains_key(id)) {
        add_field_error(&mut errors, "ingredients", format!("Invalid pk \"{id}\" - object does not exist."));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// Unknown tag slugs and authors are choice errors rather than empty results.
async fn check_list_filters(conn: &mut PgConnection, query: &RecipeListQuery) -> Result<()> {
    let mut errors = FieldErrors::new();

    let tags = Tags::new(&mut *conn).get_by_slugs(&query.tags).await?;
    for slug in query.tags.iter().filter(|slug| !tags.contains_key(*slug)) {
        add_field_error(
            &mut errors,
            "tags",
            format!("Select a valid choice. {slug} is not one of the available choices."),
        );
    }

    if let Some(author) = query.author
        && Users::new(&mut *conn).get_by_id(author).await?.is_none()
    {
        add_field_error(
            &mut errors,
            "author",
            "Select a valid choice. That choice is not one of the available choices.",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

async fn load_recipe(conn: &mut PgConnection, id: RecipeId) -> Result<RecipeDBResponse> {
    Recipes::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Recipe", id))
}

/// List recipes, newest first
#[utoipa::path(
    get,
    path = "/api/recipes/",
    tag = "recipes",
    summary = "List recipes",
    params(RecipeListParams),
    responses(
        (status = 200, description = "One page of recipes", body = PaginatedResponse<RecipeResponse>),
        (status = 400, description = "Malformed filter"),
        (status = 404, description = "Invalid page"),
    ),
    security((), ("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_recipes(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    viewer: MaybeCurrentUser,
    RawQuery(query): RawQuery,
) -> Result<Json<PaginatedResponse<RecipeResponse>>> {
    let query = RecipeListQuery::parse(query.as_deref())?;
    let page = query.pagination().resolve(&state.config.pagination)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_list_filters(&mut pool_conn, &query).await?;

    let mut filter = RecipeFilter::new(page.offset(), page.limit);
    filter.author_id = query.author;
    filter.tag_slugs = query.tags;
    // List filters only mean something for a known caller; anonymous readers get everything
    if let Some(viewer_id) = viewer.id() {
        if query.is_favorited {
            filter.favorited_by = Some(viewer_id);
        }
        if query.is_in_shopping_cart {
            filter.in_cart_of = Some(viewer_id);
        }
    }

    let count = Recipes::new(&mut pool_conn).count(&filter).await?;
    page.ensure_exists(count)?;

    let recipes = Recipes::new(&mut pool_conn).list(&filter).await?;
    let results = recipe_responses(&mut pool_conn, recipes, viewer.id(), &state.config).await?;

    Ok(Json(PaginatedResponse::new(results, count, page, &state.config, &uri)))
}

#[utoipa::path(
    get,
    path = "/api/recipes/{id}/",
    tag = "recipes",
    summary = "Get recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe", body = RecipeResponse),
        (status = 404, description = "Recipe not found"),
    ),
    security((), ("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    viewer: MaybeCurrentUser,
) -> Result<Json<RecipeResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut pool_conn, id).await?;

    Ok(Json(recipe_response(&mut pool_conn, recipe, viewer.id(), &state.config).await?))
}

/// Publish a recipe
#[utoipa::path(
    post,
    path = "/api/recipes/",
    request_body = RecipeWrite,
    tag = "recipes",
    summary = "Create recipe",
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<RecipeWrite>,
) -> Result<(StatusCode, Json<RecipeResponse>)> {
    let recipe = request.validate(RecipeWriteMode::Create, state.config.media.max_image_bytes)?;
    let (Some(name), Some(text), Some(cooking_time), Some(image)) = (&recipe.name, &recipe.text, recipe.cooking_time, &recipe.image)
    else {
        return Err(Error::Internal {
            operation: "create recipe from a partial write".to_string(),
        });
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    check_references(&mut tx, &recipe).await?;

    let root = &state.config.media.root;
    let image_path = media::store(root, MediaKind::RecipeImage, image).await?;

    let result = async {
        let created = Recipes::new(&mut tx)
            .create(&RecipeCreateDBRequest {
                author_id: current_user.id,
                name: name.clone(),
                text: text.clone(),
                image: image_path.clone(),
                cooking_time,
                tag_ids: recipe.tag_ids.clone(),
                ingredients: recipe.ingredients.clone(),
            })
            .await?;
        let response = recipe_response(&mut tx, created, Some(current_user.id), &state.config).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        Ok::<_, Error>(response)
    }
    .await;

    if result.is_err() {
        media::remove(root, &image_path).await;
    }
    let response = result?;

    tracing::info!("User {} created recipe {}", current_user.id, response.id);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Update a recipe. Tags and ingredients are replaced; omitted fields are kept.
#[utoipa::path(
    patch,
    path = "/api/recipes/{id}/",
    request_body = RecipeWrite,
    tag = "recipes",
    summary = "Update recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<RecipeWrite>,
) -> Result<Json<RecipeResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = load_recipe(&mut tx, id).await?;
    require_owner_or_admin(&current_user, Resource::Recipes, Operation::UpdateOwn, existing.author_id)?;

    let recipe = request.validate(RecipeWriteMode::Update, state.config.media.max_image_bytes)?;
    check_references(&mut tx, &recipe).await?;

    let root = &state.config.media.root;
    let new_image = match &recipe.image {
        Some(image) => Some(media::store(root, MediaKind::RecipeImage, image).await?),
        None => None,
    };

    let result = async {
        let updated = Recipes::new(&mut tx)
            .update(
                id,
                &RecipeUpdateDBRequest {
                    name: recipe.name.clone(),
                    text: recipe.text.clone(),
                    image: new_image.clone(),
                    cooking_time: recipe.cooking_time,
                    tag_ids: recipe.tag_ids.clone(),
                    ingredients: recipe.ingredients.clone(),
                },
            )
            .await?;
        let response = recipe_response(&mut tx, updated, Some(current_user.id), &state.config).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        Ok::<_, Error>(response)
    }
    .await;

    match (&result, &new_image) {
        (Err(_), Some(path)) => media::remove(root, path).await,
        (Ok(_), Some(_)) => media::remove(root, &existing.image).await,
        _ => {}
    }

    Ok(Json(result?))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/",
    tag = "recipes",
    summary = "Delete recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_recipe(State(state): State<AppState>, Path(id): Path<RecipeId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let existing = load_recipe(&mut pool_conn, id).await?;
    require_owner_or_admin(&current_user, Resource::Recipes, Operation::DeleteOwn, existing.author_id)?;

    if !Recipes::new(&mut pool_conn).delete(id).await? {
        return Err(Error::not_found("Recipe", id));
    }
    media::remove(&state.config.media.root, &existing.image).await;

    tracing::info!("User {} deleted recipe {}", current_user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Get a short shareable link to a recipe
#[utoipa::path(
    get,
    path = "/api/recipes/{id}/get-link/",
    tag = "recipes",
    summary = "Get short link",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Short link", body = ShortLinkResponse),
        (status = 404, description = "Recipe not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_short_link(State(state): State<AppState>, Path(id): Path<RecipeId>) -> Result<Json<ShortLinkResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut pool_conn, id).await?;

    let code = short_link::encode(recipe.id);
    Ok(Json(ShortLinkResponse {
        short_link: state.config.absolute_url(&format!("/s/{code}/")),
    }))
}

async fn add_to_list(
    state: &AppState,
    current_user: &CurrentUser,
    id: RecipeId,
    kind: RecipeListKind,
) -> Result<(StatusCode, Json<RecipeShortResponse>)> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut pool_conn, id).await?;

    if !RecipeLists::new(&mut pool_conn, kind).add(current_user.id, recipe.id).await? {
        return Err(Error::field(
            NON_FIELD_ERRORS,
            format!("Recipe is already in {}.", kind.display_name()),
        ));
    }

    Ok((StatusCode::CREATED, Json(RecipeShortResponse::new(&recipe, &state.config))))
}

async fn remove_from_list(state: &AppState, current_user: &CurrentUser, id: RecipeId, kind: RecipeListKind) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = load_recipe(&mut pool_conn, id).await?;

    if !RecipeLists::new(&mut pool_conn, kind).remove(current_user.id, recipe.id).await? {
        return Err(Error::field(
            NON_FIELD_ERRORS,
            format!("Recipe is not in {}.", kind.display_name()),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite/",
    tag = "recipes",
    summary = "Add to favorites",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShortResponse),
        (status = 400, description = "Already in favorites"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<(StatusCode, Json<RecipeShortResponse>)> {
    add_to_list(&state, &current_user, id, RecipeListKind::Favorites).await
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite/",
    tag = "recipes",
    summary = "Remove from favorites",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in favorites"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_favorite(State(state): State<AppState>, Path(id): Path<RecipeId>, current_user: CurrentUser) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeListKind::Favorites).await
}

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart/",
    tag = "recipes",
    summary = "Add to shopping cart",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShortResponse),
        (status = 400, description = "Already in the shopping cart"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<(StatusCode, Json<RecipeShortResponse>)> {
    add_to_list(&state, &current_user, id, RecipeListKind::ShoppingCart).await
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart/",
    tag = "recipes",
    summary = "Remove from shopping cart",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in the shopping cart"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeListKind::ShoppingCart).await
}

/// Download the summed ingredients of every recipe in the shopping cart
#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart/",
    tag = "recipes",
    summary = "Download shopping list",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Shopping list file", body = String, content_type = "text/plain"),
        (status = 400, description = "Unknown format"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Shopping cart is empty"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    current_user: CurrentUser,
    QueryParams(query): QueryParams<DownloadQuery>,
) -> Result<Response> {
    let format = query.format.unwrap_or_default();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut cart = RecipeLists::new(&mut pool_conn, RecipeListKind::ShoppingCart);
    if cart.count(current_user.id).await? == 0 {
        return Err(Error::EmptyResult {
            message: "Shopping cart is empty".to_string(),
        });
    }

    let items = shopping_list::aggregate(cart.ingredient_lines(current_user.id).await?);
    let body = shopping_list::render(&items, format)?;

    let headers = [
        (CONTENT_TYPE, format.content_type().to_string()),
        (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", format.filename())),
    ];
    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{
        TEST_IMAGE, create_authenticated_user, create_test_admin_user, create_test_app, create_test_app_with_config,
        create_test_config, create_test_ingredient, create_test_recipe, create_test_tag, create_test_token,
    };
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use std::collections::HashMap;
    use std::path::Path;

    /// Recipe ids keyed by name, for assertions
    fn ids_by_name(body: &Value) -> HashMap<String, i64> {
        body["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|r| Some((r["name"].as_str()?.to_string(), r["id"].as_i64()?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored recipe image paths under `root`, relative to it, sorted
    fn stored_images(root: &Path) -> Vec<String> {
        let mut paths: Vec<String> = std::fs::read_dir(root.join("recipes/images"))
            .map(|entries| {
                entries
                    .filter_map(|entry| Some(format!("recipes/images/{}", entry.ok()?.file_name().to_str()?)))
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_recipe(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (author, auth) = create_authenticated_user(&pool, "chef").await;
        let lunch = create_test_tag(&pool, "lunch").await;
        let beet = create_test_ingredient(&pool, "beet", "g").await;
        let salt = create_test_ingredient(&pool, "salt", "pinch").await;

        let response = app
            .post("/api/recipes/")
            .add_header("authorization", &auth)
            .json(&json!({
                "ingredients": [{"id": beet.id, "amount": 500}, {"id": salt.id, "amount": 2}],
                "tags": [lunch.id],
                "image": TEST_IMAGE,
                "name": "Borscht",
                "text": "Boil the beets.",
                "cooking_time": 90,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["name"], "Borscht");
        assert_eq!(body["author"]["id"], author.id);
        assert_eq!(body["author"]["is_subscribed"], false);
        assert_eq!(body["tags"][0]["slug"], "lunch");
        assert_eq!(body["ingredients"][0]["name"], "beet");
        assert_eq!(body["ingredients"][0]["amount"], 500);
        assert_eq!(body["ingredients"][1]["measurement_unit"], "pinch");
        assert_eq!(body["is_favorited"], false);
        assert!(body["image"].as_str().unwrap().starts_with("http://localhost:8000/media/recipes/images/"));

        // Same name from the same author is refused
        let response = app
            .post("/api/recipes/")
            .add_header("authorization", &auth)
            .json(&json!({
                "ingredients": [{"id": beet.id, "amount": 1}],
                "tags": [lunch.id],
                "image": TEST_IMAGE,
                "name": "Borscht",
                "text": "Again.",
                "cooking_time": 5,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>().get("name").is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_recipe_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_, auth) = create_authenticated_user(&pool, "chef").await;
        let lunch = create_test_tag(&pool, "lunch").await;

        app.post("/api/recipes/")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = app
            .post("/api/recipes/")
            .add_header("authorization", &auth)
            .json(&json!({
                "ingredients": [{"id": 424242, "amount": 1}],
                "tags": [lunch.id, 999999],
                "image": TEST_IMAGE,
                "name": "Mystery",
                "text": "?",
                "cooking_time": 1,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["tags"][0].as_str().unwrap().contains("999999"));
        assert!(body["ingredients"][0].as_str().unwrap().contains("424242"));

        let response = app
            .post("/api/recipes/")
            .add_header("authorization", &auth)
            .json(&json!({"name": "Nothing else"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        for field in ["ingredients", "tags", "image", "text", "cooking_time"] {
            assert!(body.get(field).is_some(), "{field} should be reported");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_recipe_flags_follow_viewer(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (author, _) = create_authenticated_user(&pool, "chef").await;
        let (_, auth) = create_authenticated_user(&pool, "reader").await;
        let recipe = create_test_recipe(&pool, author.id, "Soup", &[], &[]).await;

        app.post(&format!("/api/recipes/{}/favorite/", recipe.id))
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::CREATED);
        app.post(&format!("/api/users/{}/subscribe/", author.id))
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::CREATED);

        let body: Value = app
            .get(&format!("/api/recipes/{}/", recipe.id))
            .add_header("authorization", &auth)
            .await
            .json();
        assert_eq!(body["is_favorited"], true);
        assert_eq!(body["is_in_shopping_cart"], false);
        assert_eq!(body["author"]["is_subscribed"], true);

        let body: Value = app.get(&format!("/api/recipes/{}/", recipe.id)).await.json();
        assert_eq!(body["is_favorited"], false);
        assert_eq!(body["author"]["is_subscribed"], false);

        app.get("/api/recipes/999999/").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, _) = create_authenticated_user(&pool, "chef").await;
        let (baker, auth) = create_authenticated_user(&pool, "baker").await;
        let lunch = create_test_tag(&pool, "lunch").await;
        let dinner = create_test_tag(&pool, "dinner").await;
        let breakfast = create_test_tag(&pool, "breakfast").await;

        let soup = create_test_recipe(&pool, chef.id, "Soup", &[lunch.id, dinner.id], &[]).await;
        create_test_recipe(&pool, chef.id, "Porridge", &[breakfast.id], &[]).await;
        let bread = create_test_recipe(&pool, baker.id, "Bread", &[dinner.id], &[]).await;

        let body: Value = app.get("/api/recipes/").await.json();
        assert_eq!(body["count"], 3);
        assert_eq!(body["results"][0]["name"], "Bread");

        let body: Value = app.get(&format!("/api/recipes/?author={}", chef.id)).await.json();
        assert_eq!(body["count"], 2);

        // A recipe carrying both tags is listed once
        let body: Value = app.get("/api/recipes/?tags=lunch&tags=dinner").await.json();
        let ids = ids_by_name(&body);
        assert_eq!(body["count"], 2);
        assert_eq!(ids.get("Soup"), Some(&soup.id));
        assert_eq!(ids.get("Bread"), Some(&bread.id));

        app.post(&format!("/api/recipes/{}/shopping_cart/", soup.id))
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::CREATED);

        let body: Value = app
            .get("/api/recipes/?is_in_shopping_cart=1")
            .add_header("authorization", &auth)
            .await
            .json();
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["is_in_shopping_cart"], true);

        // Anonymous callers can't filter by their own lists
        let body: Value = app.get("/api/recipes/?is_in_shopping_cart=1").await.json();
        assert_eq!(body["count"], 3);

        let body: Value = app
            .get("/api/recipes/?is_favorited=1")
            .add_header("authorization", &auth)
            .await
            .json();
        assert_eq!(body["count"], 0);

        app.get("/api/recipes/?author=chef")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.get("/api/recipes/?page=9").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_rejects_unknown_filter_choices(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, _) = create_authenticated_user(&pool, "chef").await;
        let lunch = create_test_tag(&pool, "lunch").await;
        create_test_recipe(&pool, chef.id, "Soup", &[lunch.id], &[]).await;

        let response = app.get("/api/recipes/?tags=lunch&tags=brunch").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["tags"],
            json!(["Select a valid choice. brunch is not one of the available choices."])
        );

        let response = app.get(&format!("/api/recipes/?author={}", chef.id + 1000)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["author"][0].as_str().unwrap().starts_with("Select a valid choice."));

        let body: Value = app
            .get(&format!("/api/recipes/?author={}&tags=lunch", chef.id))
            .await
            .json();
        assert_eq!(body["count"], 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete_permissions(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, chef_auth) = create_authenticated_user(&pool, "chef").await;
        let (_, other_auth) = create_authenticated_user(&pool, "other").await;
        let admin = create_test_admin_user(&pool, "boss").await;
        let admin_auth = format!("Token {}", create_test_token(&pool, admin.id).await);
        let lunch = create_test_tag(&pool, "lunch").await;
        let dinner = create_test_tag(&pool, "dinner").await;
        let rice = create_test_ingredient(&pool, "rice", "g").await;
        let recipe = create_test_recipe(&pool, chef.id, "Pilaf", &[lunch.id], &[(rice.id, 300)]).await;

        let update = json!({
            "ingredients": [{"id": rice.id, "amount": 250}],
            "tags": [dinner.id],
            "name": "Plov",
            "text": "Slow cook.",
            "cooking_time": 120,
        });
        let path = format!("/api/recipes/{}/", recipe.id);

        app.patch(&path)
            .add_header("authorization", &other_auth)
            .json(&update)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app.patch(&path).add_header("authorization", &chef_auth).json(&update).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["name"], "Plov");
        assert_eq!(body["tags"].as_array().unwrap().len(), 1);
        assert_eq!(body["tags"][0]["slug"], "dinner");
        assert_eq!(body["ingredients"][0]["amount"], 250);
        assert!(body["image"].as_str().unwrap().ends_with(&recipe.image));

        let mut missing_tags = update.clone();
        missing_tags.as_object_mut().unwrap().remove("tags");
        app.patch(&path)
            .add_header("authorization", &chef_auth)
            .json(&missing_tags)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&path)
            .add_header("authorization", &other_auth)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.delete(&path)
            .add_header("authorization", &admin_auth)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&path).await.assert_status(StatusCode::NOT_FOUND);
        app.delete(&path)
            .add_header("authorization", &chef_auth)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_update_keeps_omitted_fields(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, auth) = create_authenticated_user(&pool, "chef").await;
        let lunch = create_test_tag(&pool, "lunch").await;
        let dinner = create_test_tag(&pool, "dinner").await;
        let rice = create_test_ingredient(&pool, "rice", "g").await;
        let recipe = create_test_recipe(&pool, chef.id, "Pilaf", &[lunch.id], &[(rice.id, 300)]).await;
        let path = format!("/api/recipes/{}/", recipe.id);

        let response = app
            .patch(&path)
            .add_header("authorization", &auth)
            .json(&json!({
                "ingredients": [{"id": rice.id, "amount": 100}],
                "tags": [dinner.id],
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["name"], recipe.name);
        assert_eq!(body["text"], recipe.text);
        assert_eq!(body["cooking_time"], recipe.cooking_time);
        assert!(body["image"].as_str().unwrap().ends_with(&recipe.image));
        assert_eq!(body["tags"][0]["slug"], "dinner");
        assert_eq!(body["ingredients"][0]["amount"], 100);

        // Sent fields are still validated
        app.patch(&path)
            .add_header("authorization", &auth)
            .json(&json!({
                "ingredients": [{"id": rice.id, "amount": 100}],
                "tags": [dinner.id],
                "cooking_time": 0,
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_recipe_image_lifecycle(pool: PgPool) {
        let media = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.media.root = media.path().to_path_buf();
        let app = create_test_app_with_config(pool.clone(), config).await;

        let (chef, auth) = create_authenticated_user(&pool, "chef").await;
        let lunch = create_test_tag(&pool, "lunch").await;
        let rice = create_test_ingredient(&pool, "rice", "g").await;
        create_test_recipe(&pool, chef.id, "Pilaf", &[lunch.id], &[(rice.id, 300)]).await;

        let write = |name: &str| {
            json!({
                "ingredients": [{"id": rice.id, "amount": 100}],
                "tags": [lunch.id],
                "image": TEST_IMAGE,
                "name": name,
                "text": "Cook it.",
                "cooking_time": 20,
            })
        };

        let response = app.post("/api/recipes/").add_header("authorization", &auth).json(&write("Risotto")).await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        let first = stored_images(media.path());
        assert_eq!(first.len(), 1);
        assert!(created["image"].as_str().unwrap().ends_with(&first[0]));

        // Unique name clash fails after the image was stored; the new file is cleaned up
        app.post("/api/recipes/")
            .add_header("authorization", &auth)
            .json(&write("Pilaf"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(stored_images(media.path()), first);

        let path = format!("/api/recipes/{}/", created["id"]);
        app.patch(&path)
            .add_header("authorization", &auth)
            .json(&write("Pilaf"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(stored_images(media.path()), first);

        // A new image replaces the old file
        let response = app.patch(&path).add_header("authorization", &auth).json(&write("Risotto")).await;
        response.assert_status_ok();
        let second = stored_images(media.path());
        assert_eq!(second.len(), 1);
        assert_ne!(second, first);
        assert!(response.json::<Value>()["image"].as_str().unwrap().ends_with(&second[0]));

        // Without an image the file stays put
        app.patch(&path)
            .add_header("authorization", &auth)
            .json(&json!({"ingredients": [{"id": rice.id, "amount": 50}], "tags": [lunch.id]}))
            .await
            .assert_status_ok();
        assert_eq!(stored_images(media.path()), second);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_favorite_twice_and_remove_absent(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, auth) = create_authenticated_user(&pool, "chef").await;
        let recipe = create_test_recipe(&pool, chef.id, "Tea", &[], &[]).await;
        let path = format!("/api/recipes/{}/favorite/", recipe.id);

        let response = app.post(&path).add_header("authorization", &auth).await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["name"], "Tea");
        assert_eq!(body["cooking_time"], 15);
        assert!(body.get("author").is_none());

        let response = app.post(&path).add_header("authorization", &auth).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["non_field_errors"][0],
            "Recipe is already in favorites."
        );

        app.delete(&path)
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&path)
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/recipes/999999/favorite/")
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_download_shopping_cart(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, auth) = create_authenticated_user(&pool, "chef").await;
        let flour = create_test_ingredient(&pool, "flour", "g").await;
        let egg = create_test_ingredient(&pool, "egg", "pcs").await;
        let pancakes = create_test_recipe(&pool, chef.id, "Pancakes", &[], &[(flour.id, 200), (egg.id, 2)]).await;
        let bread = create_test_recipe(&pool, chef.id, "Bread", &[], &[(flour.id, 500)]).await;

        app.get("/api/recipes/download_shopping_cart/")
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        for recipe in [&pancakes, &bread] {
            app.post(&format!("/api/recipes/{}/shopping_cart/", recipe.id))
                .add_header("authorization", &auth)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = app
            .get("/api/recipes/download_shopping_cart/")
            .add_header("authorization", &auth)
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), "Shopping list:\negg — 2 pcs\nflour — 700 g\n");
        let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
        assert!(disposition.contains("shopping_cart.txt"));

        let response = app
            .get("/api/recipes/download_shopping_cart/?format=csv")
            .add_header("authorization", &auth)
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), "name,measurement_unit,amount\negg,pcs,2\nflour,g,700\n");

        app.get("/api/recipes/download_shopping_cart/?format=pdf")
            .add_header("authorization", &auth)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_short_link_round_trip(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (chef, _) = create_authenticated_user(&pool, "chef").await;
        let recipe = create_test_recipe(&pool, chef.id, "Omelette", &[], &[]).await;

        let response = app.get(&format!("/api/recipes/{}/get-link/", recipe.id)).await;
        response.assert_status_ok();
        let link = response.json::<Value>()["short-link"].as_str().unwrap().to_string();
        let path = link.strip_prefix("http://localhost:8000").unwrap().to_string();
        assert!(path.starts_with("/s/"));

        let response = app.get(&path).await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers()["location"], format!("/recipes/{}/", recipe.id).as_str());

        app.get("/api/recipes/999999/get-link/").await.assert_status(StatusCode::NOT_FOUND);
    }
}
