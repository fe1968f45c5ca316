use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::{
        extract::JsonBody,
        models::{
            auth::{TokenLoginRequest, TokenResponse},
            users::{CurrentUser, REQUIRED},
        },
    },
    auth::password,
    db::handlers::{AuthTokens, Users},
    errors::{Error, FieldErrors, NON_FIELD_ERRORS, Result, add_field_error},
};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Exchange email and password for an auth token
#[utoipa::path(
    post,
    path = "/api/auth/token/login/",
    request_body = TokenLoginRequest,
    tag = "auth",
    summary = "Obtain an auth token",
    responses(
        (status = 200, description = "Token for the account", body = TokenResponse),
        (status = 400, description = "Missing fields or wrong credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, JsonBody(request): JsonBody<TokenLoginRequest>) -> Result<Json<TokenResponse>> {
    let mut errors = FieldErrors::new();
    let email = request.email.filter(|email| !email.trim().is_empty());
    let password = request.password.filter(|password| !password.is_empty());
    if email.is_none() {
        add_field_error(&mut errors, "email", REQUIRED);
    }
    if password.is_none() {
        add_field_error(&mut errors, "password", REQUIRED);
    }
    let (Some(email), Some(password)) = (email, password) else {
        return Err(Error::Validation { errors });
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn)
        .get_user_by_email(email.trim())
        .await?
        .ok_or_else(|| Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS))?;

    if !password::verify_password(password, user.password_hash.clone()).await? {
        return Err(Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    }

    let auth_token = AuthTokens::new(&mut pool_conn).get_or_create(user.id).await?;
    tracing::debug!("Issued token for user {}", user.id);

    Ok(Json(TokenResponse { auth_token }))
}

/// Delete the caller's token, signing them out on every device
#[utoipa::path(
    post,
    path = "/api/auth/token/logout/",
    tag = "auth",
    summary = "Revoke the auth token",
    responses(
        (status = 204, description = "Token deleted"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current_user: CurrentUser) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    AuthTokens::new(&mut pool_conn).delete_for_user(current_user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
