//! Application services: one method per API operation, over repository traits.

pub mod error;
pub mod posts;
pub mod repos;
pub mod sessions;
pub mod social;
pub mod users;
