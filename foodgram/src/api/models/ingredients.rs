//! API models for ingredients, both as catalog entries and as recipe lines.

use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::{ingredients::IngredientDBResponse, recipes::RecipeIngredientDBResponse};
use crate::types::IngredientId;

/// Query parameters for the ingredient catalog
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngredientResponse {
    pub id: IngredientId,
    #[schema(example = "Капуста")]
    pub name: String,
    #[schema(example = "кг")]
    pub measurement_unit: String,
}

impl From<IngredientDBResponse> for IngredientResponse {
    fn from(db: IngredientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            measurement_unit: db.measurement_unit,
        }
    }
}

/// An ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientDBResponse> for RecipeIngredientResponse {
    fn from(db: RecipeIngredientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            measurement_unit: db.measurement_unit,
            amount: db.amount,
        }
    }
}
