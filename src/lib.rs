//! Hearth: profiles, posts, comments, likes, friendships and a moderation
//! queue behind a JSON API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
