//! Client side of Hearth: a typed HTTP client, a query cache keyed by
//! logical query, and the optimistic-mutation utility that patches the cache
//! before the server answers.

pub mod cache;
pub mod client;
mod lock;
pub mod optimistic;
pub mod patches;
pub mod session;

pub use cache::{CacheEntry, QueryCache, QueryData, QueryKey};
pub use client::{ClientError, HearthClient};
pub use optimistic::{
    CacheStore, OptimisticUpdate, RollbackOutcome, apply_optimistic, run_optimistic,
    run_optimistic_all,
};
pub use session::SocialSession;
