//! API request and response data models.
//!
//! These types define the public JSON contract and are kept separate from the database models
//! in [`crate::db::models`]. Request bodies deserialize into `Option` fields so that a missing
//! field can be reported next to every other problem, as a `{"field": ["message"]}` map,
//! instead of failing deserialization on the first one.
//!
//! - [`auth`]: token login
//! - [`users`]: registration, profiles, avatars, subscriptions
//! - [`tags`], [`ingredients`]: the read-only catalog
//! - [`recipes`]: recipe writes, full and short representations, list filters
//! - [`pagination`]: page-number pagination shared by the list endpoints

pub mod auth;
pub mod ingredients;
pub mod pagination;
pub mod recipes;
pub mod tags;
pub mod users;
