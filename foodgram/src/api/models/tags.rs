//! API response models for tags.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::tags::TagDBResponse;
use crate::types::TagId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub id: TagId,
    #[schema(example = "Завтрак")]
    pub name: String,
    #[schema(example = "breakfast")]
    pub slug: String,
}

impl From<TagDBResponse> for TagResponse {
    fn from(db: TagDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            slug: db.slug,
        }
    }
}
