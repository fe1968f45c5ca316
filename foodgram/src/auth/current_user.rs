use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::{errors::DbError, handlers::AuthTokens},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Authorization scheme keyword, compared case-insensitively
const TOKEN_KEYWORD: &str = "token";

/// Extract the key from an `Authorization: Token <key>` header.
/// Returns:
/// - None: No Authorization header, or a different scheme
/// - Some(Ok(key)): Well-formed token header
/// - Some(Err(error)): Token scheme with a missing or malformed key
fn token_from_parts(parts: &Parts) -> Option<Result<&str>> {
    let header = parts.headers.get(AUTHORIZATION)?;

    let value = match header.to_str() {
        Ok(value) => value,
        Err(_) => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid token header. Token string should not contain invalid characters.".to_string()),
            }));
        }
    };

    let mut words = value.split_whitespace();
    let scheme = words.next()?;
    if !scheme.eq_ignore_ascii_case(TOKEN_KEYWORD) {
        return None;
    }

    let key = match words.next() {
        Some(key) => key,
        None => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid token header. No credentials provided.".to_string()),
            }));
        }
    };
    if words.next().is_some() {
        return Some(Err(Error::Unauthenticated {
            message: Some("Invalid token header. Token string should not contain spaces.".to_string()),
        }));
    }

    Some(Ok(key))
}

/// Resolve the request's token to a user.
///
/// `Ok(None)` means no token was sent. A token that doesn't match any user is an error,
/// even on endpoints that allow anonymous access.
#[instrument(skip(parts, state))]
async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let key = match token_from_parts(parts) {
        Some(key) => key?,
        None => {
            trace!("No token authentication attempted");
            return Ok(None);
        }
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    match AuthTokens::new(&mut conn).get_user_by_key(key).await? {
        Some(user) => {
            debug!("Found token authenticated user: {}", user.id);
            Ok(Some(CurrentUser::from(user)))
        }
        None => Err(Error::Unauthenticated {
            message: Some("Invalid token.".to_string()),
        }),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        authenticate(parts, state).await?.ok_or(Error::Unauthenticated { message: None })
    }
}

/// The authenticated user if a token was sent, for endpoints open to anonymous readers.
#[derive(Debug, Clone)]
pub struct MaybeCurrentUser(pub Option<CurrentUser>);

impl MaybeCurrentUser {
    pub fn id(&self) -> Option<crate::types::UserId> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequestParts<AppState> for MaybeCurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        Ok(MaybeCurrentUser(authenticate(parts, state).await?))
    }
}
