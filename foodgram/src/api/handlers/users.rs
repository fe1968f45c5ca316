use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use std::collections::HashSet;

use crate::{
    AppState,
    api::{
        extract::{JsonBody, QueryParams},
        models::{
            pagination::{PaginatedResponse, Pagination},
            recipes::RecipeShortResponse,
            users::{
                AvatarResponse, AvatarUpdate, CurrentUser, RecipesLimitQuery, SetPassword, SubscriptionResponse, UserCreate,
                UserCreatedResponse, UserResponse, REQUIRED,
            },
        },
    },
    auth::{current_user::MaybeCurrentUser, password},
    config::Config,
    db::{
        handlers::{Recipes, Repository, Subscriptions, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, FieldErrors, NON_FIELD_ERRORS, Result, add_field_error},
    media::{self, MediaKind},
    types::{Operation, Permission, Resource, UserId},
};

/// List all users
#[utoipa::path(
    get,
    path = "/api/users/",
    tag = "users",
    summary = "List users",
    params(Pagination),
    responses(
        (status = 200, description = "One page of users", body = PaginatedResponse<UserResponse>),
        (status = 404, description = "Invalid page"),
    ),
    security((), ("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    viewer: MaybeCurrentUser,
    QueryParams(pagination): QueryParams<Pagination>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let page = pagination.resolve(&state.config.pagination)?;
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let count = Users::new(&mut pool_conn).count().await?;
    page.ensure_exists(count)?;

    let users = Users::new(&mut pool_conn)
        .list(&UserFilter::new(page.offset(), page.limit))
        .await?;

    let followed = match viewer.id() {
        Some(viewer_id) => {
            let ids: Vec<UserId> = users.iter().map(|user| user.id).collect();
            Subscriptions::new(&mut pool_conn).followed_among(viewer_id, &ids).await?
        }
        None => HashSet::new(),
    };

    let results = users
        .into_iter()
        .map(|user| {
            let is_subscribed = followed.contains(&user.id);
            UserResponse::new(user, is_subscribed, &state.config)
        })
        .collect();

    Ok(Json(PaginatedResponse::new(results, count, page, &state.config, &uri)))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/users/",
    request_body = UserCreate,
    tag = "users",
    summary = "Register",
    responses(
        (status = 201, description = "User created", body = UserCreatedResponse),
        (status = 400, description = "Invalid fields, or email or username taken"),
        (status = 403, description = "Registration is disabled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UserCreate>,
) -> Result<(StatusCode, Json<UserCreatedResponse>)> {
    if !state.config.auth.allow_registration {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Users, Operation::CreateOwn),
            action: Operation::CreateOwn,
            resource: "users: registration is disabled".to_string(),
        });
    }

    let new_user = request.validate(&state.config.auth.password)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Emails are unique regardless of case; the database constraint only sees exact matches
    if Users::new(&mut pool_conn).get_user_by_email(&new_user.email).await?.is_some() {
        return Err(Error::field("email", "A user with this email already exists."));
    }

    let password_hash = password::hash_password(new_user.password, state.config.auth.password.argon2_params()).await?;

    let user = Users::new(&mut pool_conn)
        .create(&UserCreateDBRequest {
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash,
            is_admin: false,
        })
        .await?;

    tracing::info!("Registered user {} ({})", user.id, user.username);
    Ok((StatusCode::CREATED, Json(UserCreatedResponse::from(user))))
}

/// Get a user's public profile
#[utoipa::path(
    get,
    path = "/api/users/{id}/",
    tag = "users",
    summary = "Get user",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found"),
    ),
    security((), ("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    viewer: MaybeCurrentUser,
) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User", id))?;

    let is_subscribed = match viewer.id() {
        Some(viewer_id) => Subscriptions::new(&mut pool_conn)
            .followed_among(viewer_id, &[id])
            .await?
            .contains(&id),
        None => false,
    };

    Ok(Json(UserResponse::new(user, is_subscribed, &state.config)))
}

/// Get the caller's own profile
#[utoipa::path(
    get,
    path = "/api/users/me/",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "Own profile", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    Ok(Json(UserResponse::own_profile(&current_user, &state.config)))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/api/users/set_password/",
    request_body = SetPassword,
    tag = "users",
    summary = "Change password",
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<SetPassword>,
) -> Result<StatusCode> {
    let mut errors = FieldErrors::new();
    let new_password = request.new_password.filter(|password| !password.is_empty());
    let current_password = request.current_password.filter(|password| !password.is_empty());
    if new_password.is_none() {
        add_field_error(&mut errors, "new_password", REQUIRED);
    }
    if current_password.is_none() {
        add_field_error(&mut errors, "current_password", REQUIRED);
    }
    let (Some(new_password), Some(current_password)) = (new_password, current_password) else {
        return Err(Error::Validation { errors });
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;

    if !password::verify_password(current_password, user.password_hash.clone()).await? {
        return Err(Error::field("current_password", "Invalid password."));
    }

    let attributes = [
        user.username.as_str(),
        user.email.as_str(),
        user.first_name.as_str(),
        user.last_name.as_str(),
    ];
    let problems = password::validate_password(&new_password, &attributes, &state.config.auth.password);
    if !problems.is_empty() {
        return Err(Error::Validation {
            errors: FieldErrors::from([("new_password".to_string(), problems)]),
        });
    }

    let password_hash = password::hash_password(new_password, state.config.auth.password.argon2_params()).await?;
    Users::new(&mut pool_conn)
        .update(user.id, &UserUpdateDBRequest::password(password_hash))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Upload or replace the caller's avatar
#[utoipa::path(
    put,
    path = "/api/users/me/avatar/",
    request_body = AvatarUpdate,
    tag = "users",
    summary = "Set avatar",
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "Missing or invalid image"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_avatar(
    State(state): State<AppState>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<AvatarUpdate>,
) -> Result<Json<AvatarResponse>> {
    let value = request
        .avatar
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::field("avatar", REQUIRED))?;
    let image = media::decode_data_uri(&value, state.config.media.max_image_bytes).map_err(|e| Error::field("avatar", e.to_string()))?;

    let root = &state.config.media.root;
    let path = media::store(root, MediaKind::Avatar, &image).await?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Err(e) = Users::new(&mut pool_conn)
        .update(current_user.id, &UserUpdateDBRequest::avatar(Some(path.clone())))
        .await
    {
        media::remove(root, &path).await;
        return Err(e.into());
    }

    if let Some(previous) = &current_user.avatar {
        media::remove(root, previous).await;
    }

    Ok(Json(AvatarResponse {
        avatar: media::media_url(&state.config, &path),
    }))
}

/// Remove the caller's avatar
#[utoipa::path(
    delete,
    path = "/api/users/me/avatar/",
    tag = "users",
    summary = "Delete avatar",
    responses(
        (status = 204, description = "Avatar removed"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_avatar(State(state): State<AppState>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut pool_conn)
        .update(current_user.id, &UserUpdateDBRequest::avatar(None))
        .await?;

    if let Some(previous) = &current_user.avatar {
        media::remove(&state.config.media.root, previous).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Attach recipe previews and counts to followed authors
async fn subscription_responses(
    conn: &mut PgConnection,
    authors: Vec<UserDBResponse>,
    recipes_limit: Option<i64>,
    config: &Config,
) -> Result<Vec<SubscriptionResponse>> {
    let author_ids: Vec<UserId> = authors.iter().map(|author| author.id).collect();

    let mut latest = Recipes::new(&mut *conn).latest_by_authors(&author_ids, recipes_limit).await?;
    let counts = Recipes::new(&mut *conn).count_by_authors(&author_ids).await?;

    Ok(authors
        .into_iter()
        .map(|author| {
            let recipes = latest
                .remove(&author.id)
                .unwrap_or_default()
                .iter()
                .map(|recipe| RecipeShortResponse::new(recipe, config))
                .collect();
            let recipes_count = counts.get(&author.id).copied().unwrap_or(0);
            SubscriptionResponse::new(author, recipes, recipes_count, config)
        })
        .collect())
}

/// List the authors the caller follows, with their recipes
#[utoipa::path(
    get,
    path = "/api/users/subscriptions/",
    tag = "users",
    summary = "List subscriptions",
    params(Pagination, RecipesLimitQuery),
    responses(
        (status = 200, description = "One page of followed authors", body = PaginatedResponse<SubscriptionResponse>),
        (status = 400, description = "Invalid recipes_limit"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Invalid page"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    current_user: CurrentUser,
    QueryParams(pagination): QueryParams<Pagination>,
    QueryParams(limit_query): QueryParams<RecipesLimitQuery>,
) -> Result<Json<PaginatedResponse<SubscriptionResponse>>> {
    let recipes_limit = limit_query.limit()?;
    let page = pagination.resolve(&state.config.pagination)?;
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let count = Subscriptions::new(&mut pool_conn).count(current_user.id).await?;
    page.ensure_exists(count)?;

    let authors = Subscriptions::new(&mut pool_conn)
        .list_authors(current_user.id, page.offset(), page.limit)
        .await?;
    let results = subscription_responses(&mut pool_conn, authors, recipes_limit, &state.config).await?;

    Ok(Json(PaginatedResponse::new(results, count, page, &state.config, &uri)))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe/",
    tag = "users",
    summary = "Subscribe",
    params(("id" = i64, Path, description = "Author ID"), RecipesLimitQuery),
    responses(
        (status = 201, description = "Now following", body = SubscriptionResponse),
        (status = 400, description = "Already following, or following oneself"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Author not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    QueryParams(limit_query): QueryParams<RecipesLimitQuery>,
) -> Result<(StatusCode, Json<SubscriptionResponse>)> {
    let recipes_limit = limit_query.limit()?;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let author = Users::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User", id))?;

    if author.id == current_user.id {
        return Err(Error::field(NON_FIELD_ERRORS, "You cannot subscribe to yourself."));
    }
    if !Subscriptions::new(&mut tx).subscribe(current_user.id, author.id).await? {
        return Err(Error::field(NON_FIELD_ERRORS, "You are already subscribed to this user."));
    }

    let mut responses = subscription_responses(&mut tx, vec![author], recipes_limit, &state.config).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let response = responses.pop().ok_or_else(|| Error::Internal {
        operation: "build subscription response".to_string(),
    })?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Stop following an author
#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe/",
    tag = "users",
    summary = "Unsubscribe",
    params(("id" = i64, Path, description = "Author ID")),
    responses(
        (status = 204, description = "No longer following"),
        (status = 400, description = "Not following this author"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Author not found"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn unsubscribe(State(state): State<AppState>, Path(id): Path<UserId>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut pool_conn).get_by_id(id).await?.is_none() {
        return Err(Error::not_found("User", id));
    }
    if !Subscriptions::new(&mut pool_conn).unsubscribe(current_user.id, id).await? {
        return Err(Error::field(NON_FIELD_ERRORS, "You are not subscribed to this user."));
    }

    Ok(StatusCode::NO_CONTENT)
}
