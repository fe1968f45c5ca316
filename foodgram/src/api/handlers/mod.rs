//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and ownership checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Token login and logout
//! - [`users`]: Registration, profiles, passwords, avatars and subscriptions
//! - [`tags`]: Read-only tag catalog
//! - [`ingredients`]: Read-only ingredient catalog with prefix search
//! - [`recipes`]: Recipe CRUD, favorites, shopping cart and the shopping list download
//! - [`short_links`]: Redirects for short recipe links
//!
//! # Authentication
//!
//! Handlers that need a caller take [`crate::api::models::users::CurrentUser`], which rejects
//! the request with 401 when no valid token is sent. Handlers open to anonymous readers take
//! [`crate::auth::current_user::MaybeCurrentUser`] instead.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status with
//! either a `{"detail": ...}` body or a map of field errors.

pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod short_links;
pub mod tags;
pub mod users;
