//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, RecipeId, etc.)
//! - Permission and authorization types
//! - Resource and operation enums for access control
//!
//! # ID Types
//!
//! All entity IDs are `BIGSERIAL` keys wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`RecipeId`]: Recipe identifier (also the payload of short links)
//! - [`TagId`]: Tag identifier
//! - [`IngredientId`]: Ingredient identifier
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being changed (Recipes, Users)
//! - [`Operation`]: What action is being performed
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! Reads are open to everyone and never checked, so only writes have operations. They come in
//! two flavors:
//! - **All**: Unrestricted access to all entities (`UpdateAll`, `DeleteAll`)
//! - **Own**: Restricted to the caller's own entities (e.g., `UpdateOwn`)

use std::fmt;

// Type aliases for IDs
pub type UserId = i64;
pub type RecipeId = i64;
pub type TagId = i64;
pub type IngredientId = i64;

// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Recipes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Logical combinators
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateOwn => write!(f, "Create"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Recipes => "recipes",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display_collapses_scope() {
        assert_eq!(Operation::UpdateAll.to_string(), "Update");
        assert_eq!(Operation::UpdateOwn.to_string(), "Update");
        assert_eq!(Operation::DeleteOwn.to_string(), "Delete");
    }

    #[test]
    fn test_resource_display() {
        assert_eq!(Resource::Users.to_string(), "users");
        assert_eq!(Resource::Recipes.to_string(), "recipes");
    }
}
