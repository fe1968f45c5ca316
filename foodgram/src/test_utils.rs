//! Test utilities: configuration, application setup and fixtures.

use crate::auth::password::hash_string_with_params;
use crate::config::{Config, PoolSettings};
use crate::db::handlers::{AuthTokens, Ingredients, Recipes, Repository, Tags, Users};
use crate::db::models::{
    ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
    recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientDBRequest},
    tags::{TagCreateDBRequest, TagDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{IngredientId, TagId, UserId};
use crate::{AppState, Application};
use axum_test::TestServer;
use sqlx::PgPool;

/// Password of every user created by [`create_test_user`]
pub const TEST_PASSWORD: &str = "Tomato-Basil-91";

/// 1x1 PNG as a data URI
pub const TEST_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn create_test_config() -> Config {
    let media_root = std::env::temp_dir().join(format!("foodgram-test-media-{}", std::process::id()));

    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.admin_email = "admin@test.com".to_string();
    config.database.pool = PoolSettings {
        max_connections: 4,
        min_connections: 0,
        ..Default::default()
    };
    config.media.root = media_root;
    // Cheap hashing keeps the suite fast
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;
    config
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub async fn create_test_user(pool: &PgPool, username: &str) -> UserDBResponse {
    create_user(pool, username, false).await
}

pub async fn create_test_admin_user(pool: &PgPool, username: &str) -> UserDBResponse {
    create_user(pool, username, true).await
}

async fn create_user(pool: &PgPool, username: &str, is_admin: bool) -> UserDBResponse {
    let params = create_test_config().auth.password.argon2_params();
    let password_hash = hash_string_with_params(TEST_PASSWORD, params).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: username.to_string(),
            password_hash,
            is_admin,
        })
        .await
        .expect("Failed to create test user")
}

/// Issue a token for the user, returning the key
pub async fn create_test_token(pool: &PgPool, user_id: UserId) -> String {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    AuthTokens::new(&mut conn)
        .get_or_create(user_id)
        .await
        .expect("Failed to create test token")
}

/// A user plus the `Authorization` header value to act as them
pub async fn create_authenticated_user(pool: &PgPool, username: &str) -> (UserDBResponse, String) {
    let user = create_test_user(pool, username).await;
    let key = create_test_token(pool, user.id).await;
    (user, format!("Token {key}"))
}

pub async fn create_test_tag(pool: &PgPool, slug: &str) -> TagDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Tags::new(&mut conn)
        .upsert(&TagCreateDBRequest {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
        })
        .await
        .expect("Failed to create test tag")
}

pub async fn create_test_ingredient(pool: &PgPool, name: &str, measurement_unit: &str) -> IngredientDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Ingredients::new(&mut conn)
        .upsert(&IngredientCreateDBRequest {
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        })
        .await
        .expect("Failed to create test ingredient")
}

/// Insert a recipe directly. Its image path points at no real file.
pub async fn create_test_recipe(
    pool: &PgPool,
    author_id: UserId,
    name: &str,
    tag_ids: &[TagId],
    ingredients: &[(IngredientId, i32)],
) -> RecipeDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Recipes::new(&mut conn)
        .create(&RecipeCreateDBRequest {
            author_id,
            name: name.to_string(),
            text: format!("How to make {name}"),
            image: format!("recipes/images/{}.png", uuid::Uuid::new_v4()),
            cooking_time: 15,
            tag_ids: tag_ids.to_vec(),
            ingredients: ingredients
                .iter()
                .map(|&(ingredient_id, amount)| RecipeIngredientDBRequest { ingredient_id, amount })
                .collect(),
        })
        .await
        .expect("Failed to create test recipe")
}
