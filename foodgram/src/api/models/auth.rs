//! API request/response models for token authentication.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credentials exchanged for an auth token
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TokenLoginRequest {
    #[schema(example = "vivanov@yandex.ru")]
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Send as `Authorization: Token <auth_token>`
    pub auth_token: String,
}
