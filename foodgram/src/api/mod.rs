//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`extract`]**: Body and query extractors that reject with JSON errors
//!
//! # API Structure
//!
//! - **Auth** (`/api/auth/token/*`): Token login and logout
//! - **Users** (`/api/users/*`): Registration, profiles, avatars, subscriptions
//! - **Tags** (`/api/tags/*`) and **Ingredients** (`/api/ingredients/*`): Read-only catalog
//! - **Recipes** (`/api/recipes/*`): Recipes, favorites, shopping cart and list download
//! - **Short links** (`/s/{code}/`): Redirects to recipe pages
//!
//! Every path ends with a slash.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod extract;
pub mod handlers;
pub mod models;
