//! Database record structures and request types for the repositories in [`crate::db::handlers`].
//!
//! - `*CreateDBRequest` / `*UpdateDBRequest`: inputs to repository writes
//! - `*DBResponse`: rows as returned by the repositories

pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;
