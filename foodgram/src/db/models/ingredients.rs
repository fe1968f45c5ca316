use crate::types::IngredientId;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientCreateDBRequest {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IngredientDBResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}
