//! Application services: listings, authoring, subscriptions and sessions.

pub mod auth;
pub mod chrome;
pub mod comments;
pub mod error;
pub mod feed;
pub mod follows;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod repos;
