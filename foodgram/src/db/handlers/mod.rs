//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction)
//! and exposes typed queries for one table. Full CRUD repositories implement [`Repository`].
//!
//! - [`Users`]: accounts, lookups by email, paginated listing
//! - [`AuthTokens`]: token-auth keys, one per user
//! - [`Tags`], [`Ingredients`]: read-mostly catalog, upserted by the import commands
//! - [`Recipes`]: recipes with their tag and ingredient links
//! - [`RecipeLists`]: per-user favorites and shopping cart
//! - [`Subscriptions`]: follow edges between users
//!
//! ```ignore
//! use foodgram::db::handlers::{Recipes, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let recipe = Recipes::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod auth_tokens;
pub mod ingredients;
pub mod recipe_lists;
pub mod recipes;
pub mod repository;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use auth_tokens::AuthTokens;
pub use ingredients::Ingredients;
pub use recipe_lists::{RecipeListKind, RecipeLists};
pub use recipes::Recipes;
pub use repository::Repository;
pub use subscriptions::Subscriptions;
pub use tags::Tags;
pub use users::Users;
