//! CRUD contract shared by the user and recipe tables.

use std::collections::HashMap;

use crate::db::errors::Result;

/// CRUD access to one owning table.
///
/// [`Users`](super::Users) and [`Recipes`](super::Recipes) implement it; lookup-only tables
/// (tags, ingredients) and link tables expose plain inherent methods instead. Recipe
/// implementations also write the recipe's tag and ingredient links inside `create`/`update`.
#[async_trait::async_trait]
pub trait Repository {
    /// Row to insert
    type CreateRequest;

    /// Changes to apply; `None` fields keep the stored value
    type UpdateRequest;

    /// Row as read back
    type Response;

    type Id: Send + Sync;

    /// Narrowing plus offset/limit for [`Repository::list`]
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// `None` when no row has this id
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Rows for `ids`, keyed by id. Missing ids are left out.
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// `false` when nothing was deleted
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Fails with [`DbError::NotFound`](crate::db::errors::DbError::NotFound) for an unknown id
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
