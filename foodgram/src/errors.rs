use crate::db::errors::DbError;
use crate::types::{Operation, Permission};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Field name to list of messages, rendered as the body of a validation error
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key used for errors that don't belong to a single field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or credentials invalid
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks required permissions for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Invalid request or business rule violation not tied to one field
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body refused before parsing: too large (413) or not JSON (415)
    #[error("{message}")]
    BodyRejected { status: StatusCode, message: String },

    /// Request body failed field validation
    #[error("Validation failed: {errors:?}")]
    Validation { errors: FieldErrors },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Nothing to return at this location (page past the end, empty cart)
    #[error("{message}")]
    EmptyResult { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Validation error carrying a single message for a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        Error::Validation { errors }
    }

    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::BodyRejected { status, .. } => *status,
            Error::NotFound { .. } | Error::EmptyResult { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message
                .clone()
                .unwrap_or_else(|| "Authentication credentials were not provided.".to_string()),
            Error::InsufficientPermissions { action, resource, .. } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } | Error::BodyRejected { message, .. } => message.clone(),
            Error::Validation { .. } => "Invalid request data".to_string(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::EmptyResult { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

/// Append a message to the list kept for `field`
pub fn add_field_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Map a violated constraint onto the request field it guards.
fn constraint_field_error(constraint: Option<&str>) -> (&'static str, &'static str) {
    match constraint {
        Some("users_email_unique") => ("email", "A user with this email already exists."),
        Some("users_username_unique") => ("username", "A user with this username already exists."),
        Some("recipes_name_author_unique") => ("name", "You already have a recipe with this name."),
        Some("tags_slug_unique") => ("slug", "A tag with this slug already exists."),
        Some("favorite_recipes_unique") => (NON_FIELD_ERRORS, "Recipe is already in favorites."),
        Some("shopping_cart_unique") => (NON_FIELD_ERRORS, "Recipe is already in the shopping cart."),
        Some("subscriptions_unique") => (NON_FIELD_ERRORS, "You are already subscribed to this user."),
        Some("subscriptions_no_self_follow") => (NON_FIELD_ERRORS, "You cannot subscribe to yourself."),
        Some("recipes_cooking_time_positive") => ("cooking_time", "Ensure this value is greater than or equal to 1."),
        Some("recipe_ingredients_amount_positive") => ("ingredients", "Ensure each amount is greater than or equal to 1."),
        Some("recipe_ingredients_unique") => ("ingredients", "Ingredients must not repeat."),
        _ => (NON_FIELD_ERRORS, "Invalid data provided."),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. }
            | Error::BodyRejected { .. }
            | Error::Validation { .. }
            | Error::NotFound { .. }
            | Error::EmptyResult { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match self {
            Error::Validation { errors } => (status, Json(errors)).into_response(),
            Error::Database(
                ref db_err @ (DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. }),
            ) => {
                let (field, message) = constraint_field_error(db_err.constraint());
                let errors = FieldErrors::from([(field.to_string(), vec![message.to_string()])]);
                (status, Json(errors)).into_response()
            }
            other => (status, Json(json!({ "detail": other.user_message() }))).into_response(),
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
