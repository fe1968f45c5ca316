//! # foodgram: Recipe Sharing Backend
//!
//! `foodgram` is the HTTP API behind a recipe sharing site. Users publish recipes with a photo,
//! tags and a list of ingredients, follow other authors, keep favorites, and collect recipes in a
//! shopping cart that can be downloaded as a combined shopping list.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Uploaded images are stored on the local filesystem under
//! the configured media root and served back at `/media/*`.
//!
//! ### Request Flow
//!
//! Every route lives under `/api/*`, apart from the short link redirect at `/s/{code}/`.
//! Authentication is a per-user token sent as `Authorization: Token <key>`. Handlers pull the
//! caller out of the request with the extractors in [`auth::current_user`], so anonymous reads and
//! authenticated writes share the same routing. Handlers then talk to the database through the
//! repositories in [`db::handlers`], each borrowing a pooled connection or an open transaction.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the request handlers plus the wire models for users, tags,
//! ingredients and recipes. Errors from every layer end up in [`errors::Error`], which renders
//! the `{"detail": ...}` or per-field error bodies clients expect.
//!
//! The **authentication layer** ([`auth`]) covers Argon2 password hashing, the password policy,
//! the token extractors and ownership checks for recipe writes.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Recipe lists (favorites and the
//! shopping cart) share one repository parameterised by [`db::handlers::RecipeListKind`].
//!
//! Supporting modules cover the shopping list renderer ([`shopping_list`]), the short link
//! codec ([`short_link`]), image storage ([`media`]) and the catalog CSV import ([`import`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use foodgram::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = foodgram::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize telemetry (structured logging and optional OpenTelemetry)
//!     foodgram::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! foodgram::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod db;
pub mod errors;
pub mod import;
pub mod media;
mod openapi;
pub mod shopping_list;
pub mod short_link;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::password,
    config::CorsOrigin,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{IngredientId, RecipeId, TagId, UserId};

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from file and environment
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the foodgram database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Ensure the configured admin account exists.
///
/// Does nothing unless `admin_password` is set. An existing account with the admin email is
/// promoted and gets the configured password; otherwise a new admin is created. Safe to run on
/// every startup.
///
/// Returns the admin's id, or `None` when no password is configured.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<Option<UserId>> {
    let Some(admin_password) = config.admin_password.clone() else {
        debug!("No admin password configured, skipping admin user");
        return Ok(None);
    };

    let password_hash = password::hash_password(admin_password, config.auth.password.argon2_params())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let user_id = if let Some(existing_user) = user_repo.get_user_by_email(&config.admin_email).await? {
        let update = UserUpdateDBRequest {
            password_hash: Some(password_hash),
            is_admin: Some(true),
            ..Default::default()
        };
        user_repo.update(existing_user.id, &update).await?;
        info!("Updated admin user {}", existing_user.id);
        existing_user.id
    } else {
        let created = user_repo
            .create(&UserCreateDBRequest {
                email: config.admin_email.clone(),
                username: config.admin_username.clone(),
                first_name: "Admin".to_string(),
                last_name: "Admin".to_string(),
                password_hash,
                is_admin: true,
            })
            .await?;
        info!("Created admin user {}", created.id);
        created.id
    };

    tx.commit().await?;
    Ok(Some(user_id))
}

/// Connect to the configured database, run migrations and ensure the admin user.
pub async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    create_initial_admin_user(config, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Request bodies carry base64 images, a third larger than the decoded file, plus the JSON around them.
fn body_limit(config: &Config) -> usize {
    config.media.max_image_bytes / 3 * 4 + 64 * 1024
}

/// Build the application router with all endpoints and middleware.
///
/// Prometheus metrics are mounted at `/internal/metrics` when `enable_metrics` is set. The
/// recorder is process global, so only one metrics-enabled router can be built per process.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, ingredients, recipes, short_links, tags, users};

    let api_routes = Router::new()
        // Token auth
        .route("/auth/token/login/", post(auth::login))
        .route("/auth/token/logout/", post(auth::logout))
        // Users
        .route("/users/", get(users::list_users).post(users::create_user))
        .route("/users/me/", get(users::get_me))
        .route("/users/me/avatar/", put(users::update_avatar).delete(users::delete_avatar))
        .route("/users/set_password/", post(users::set_password))
        .route("/users/subscriptions/", get(users::list_subscriptions))
        .route("/users/{id}/", get(users::get_user))
        .route("/users/{id}/subscribe/", post(users::subscribe).delete(users::unsubscribe))
        // Catalog
        .route("/tags/", get(tags::list_tags))
        .route("/tags/{id}/", get(tags::get_tag))
        .route("/ingredients/", get(ingredients::list_ingredients))
        .route("/ingredients/{id}/", get(ingredients::get_ingredient))
        // Recipes
        .route("/recipes/", get(recipes::list_recipes).post(recipes::create_recipe))
        .route("/recipes/download_shopping_cart/", get(recipes::download_shopping_cart))
        .route(
            "/recipes/{id}/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/recipes/{id}/get-link/", get(recipes::get_short_link))
        .route(
            "/recipes/{id}/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(recipes::add_to_shopping_cart).delete(recipes::remove_from_shopping_cart),
        )
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(DefaultBodyLimit::max(body_limit(&state.config)))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/s/{code}/", get(short_links::resolve_short_link))
        .with_state(state.clone())
        .nest("/api", api_routes)
        .nest_service("/media", ServeDir::new(&state.config.media.root))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled server: router, configuration and database pool.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds
///    the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish, then the
///    pool is closed and telemetry flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application, reusing `pool` when given instead of connecting from config
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting foodgram with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                create_initial_admin_user(&config, &pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        tokio::fs::create_dir_all(&config.media.root).await?;

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Foodgram listening on http://{}, available at {}",
            bind_addr, self.config.public_url
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{AppState, create_initial_admin_user};
    use crate::{
        auth::password,
        db::handlers::Users,
        test_utils::*,
    };
    use serde_json::Value;
    use sqlx::PgPool;

    fn admin_config() -> crate::Config {
        let mut config = create_test_config();
        config.admin_email = "chef@foodgram.test".to_string();
        config.admin_username = "chef".to_string();
        config.admin_password = Some("Head-Chef-2024".to_string());
        config
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_new_user(pool: PgPool) {
        let config = admin_config();

        let user_id = create_initial_admin_user(&config, &pool)
            .await
            .expect("Should create admin user successfully")
            .expect("Admin should be created when a password is set");

        let mut conn = pool.acquire().await.unwrap();
        let created = Users::new(&mut conn)
            .get_user_by_email("chef@foodgram.test")
            .await
            .unwrap()
            .expect("User should exist");

        assert_eq!(created.id, user_id);
        assert_eq!(created.username, "chef");
        assert!(created.is_admin);
        assert!(password::verify_string("Head-Chef-2024", &created.password_hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_existing_user(pool: PgPool) {
        let existing = create_test_user(&pool, "chef").await;
        let mut config = admin_config();
        config.admin_email = existing.email.clone();

        let returned = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(returned, Some(existing.id));

        // Running again changes nothing
        let again = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(again, Some(existing.id));

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .get_user_by_email(&existing.email)
            .await
            .unwrap()
            .expect("User should still exist");
        assert!(user.is_admin);
        assert!(password::verify_string("Head-Chef-2024", &user.password_hash).unwrap());
        assert!(!password::verify_string(TEST_PASSWORD, &user.password_hash).unwrap());
    }

    #[sqlx::test]
    async fn test_create_initial_admin_user_without_password(pool: PgPool) {
        let config = create_test_config();
        assert!(create_initial_admin_user(&config, &pool).await.unwrap().is_none());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(Users::new(&mut conn).count().await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        let server = create_test_app_with_config(pool.clone(), admin_config()).await;

        let health_response = server.get("/healthz").await;
        assert_eq!(health_response.status_code().as_u16(), 200);
        assert_eq!(health_response.text(), "OK");

        // Admin from config can log in
        let login = server
            .post("/api/auth/token/login/")
            .json(&serde_json::json!({"email": "chef@foodgram.test", "password": "Head-Chef-2024"}))
            .await;
        login.assert_status_ok();

        // Writes require auth
        let api_response = server.post("/api/recipes/").json(&serde_json::json!({})).await;
        assert_eq!(api_response.status_code().as_u16(), 401);

        // Unknown routes are plain 404s
        assert_eq!(server.get("/api/nothing-here/").await.status_code().as_u16(), 404);
    }

    #[sqlx::test]
    async fn test_openapi_json_endpoint(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        let doc: Value = response.json();
        assert!(doc["openapi"].as_str().unwrap().starts_with("3."));
        assert!(doc["paths"].get("/api/recipes/").is_some());

        let docs_page = server.get("/api/docs").await;
        docs_page.assert_status_ok();
        assert!(docs_page.text().to_lowercase().contains("<html"));
    }

    #[sqlx::test]
    async fn test_media_files_are_served(pool: PgPool) {
        let config = create_test_config();
        let dir = config.media.root.join("recipes/images");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("served.png"), b"not really a png").await.unwrap();

        let server = create_test_app_with_config(pool, config).await;
        let response = server.get("/media/recipes/images/served.png").await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"not really a png");
    }

    #[sqlx::test]
    async fn test_build_router_with_metrics_disabled(pool: PgPool) {
        let mut config = create_test_config();
        config.enable_metrics = false;

        let app_state = AppState::builder().db(pool).config(config).build();
        let router = super::build_router(&app_state).expect("Failed to build router");
        let server = axum_test::TestServer::new(router).expect("Failed to create test server");

        let metrics_response = server.get("/internal/metrics").await;
        assert_eq!(metrics_response.status_code().as_u16(), 404);
    }

    // The Prometheus recorder is process global: keep this the only metrics-enabled router in the suite.
    #[sqlx::test]
    async fn test_build_router_with_metrics_enabled(pool: PgPool) {
        let mut config = create_test_config();
        config.enable_metrics = true;

        let app_state = AppState::builder().db(pool).config(config).build();
        let router = super::build_router(&app_state).expect("Failed to build router");
        let server = axum_test::TestServer::new(router).expect("Failed to create test server");

        // Generate at least one request so there is something to report
        server.get("/healthz").await.assert_status_ok();

        let metrics_response = server.get("/internal/metrics").await;
        assert_eq!(metrics_response.status_code().as_u16(), 200);

        let metrics_content = metrics_response.text();
        assert!(metrics_content.contains("# HELP") || metrics_content.contains("# TYPE"));
    }
}
