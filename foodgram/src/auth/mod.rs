//! Authentication and authorization.
//!
//! Clients authenticate with a per-user token obtained from `/api/auth/token/login/` and
//! sent on every request as `Authorization: Token <key>`. Tokens don't expire; logging out
//! deletes the key.
//!
//! # Modules
//!
//! - [`current_user`]: Extractors resolving the token to a user
//! - [`password`]: Argon2 hashing and the password policy
//! - [`permissions`]: Ownership checks for writes
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use foodgram::api::models::users::CurrentUser;
//! use foodgram::auth::current_user::MaybeCurrentUser;
//!
//! // 401 without a valid token
//! async fn me(current_user: CurrentUser) -> Json<CurrentUser> { Json(current_user) }
//!
//! // Anonymous allowed, `None` when no token was sent
//! async fn list(MaybeCurrentUser(viewer): MaybeCurrentUser) { /* ... */ }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
