//! Repository traits describing persistence adapters.
//!
//! Operations that touch two documents (both sides of a relationship) or two
//! collections (a post and its approved copy) are single trait methods, so
//! each adapter can make them atomic: Postgres runs them in one transaction,
//! the in-memory store under one write lock.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    EducationEntry, Location, PostRecord, SocialLink, UserRecord, WorkEntry,
};
use crate::domain::posts::{PostEffect, PostOp, PostRuleError};
use crate::domain::relationships::{RelationshipError, RelationshipOp};
use crate::domain::sessions::SessionRecord;
use crate::domain::usernames::{CooldownError, cooldown_remaining};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Failure of a read-validate-write operation: either the domain rule
/// refused the change or the store failed.
#[derive(Debug, Error)]
pub enum MutationError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Rejected(E),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPair {
    pub actor: UserRecord,
    pub target: UserRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostMutation {
    pub post: PostRecord,
    pub effect: PostEffect,
}

/// Validated profile changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub profile: Option<String>,
    pub cover: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub location: Option<Location>,
    pub work: Option<Vec<WorkEntry>>,
    pub education: Option<Vec<EducationEntry>>,
    pub social_links: Option<Vec<SocialLink>>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to the stored document. Rename cooldowns are checked against
    /// `user` itself, so adapters call this on the locked copy; on error
    /// nothing is changed.
    pub fn apply_to(&self, user: &mut UserRecord, at: OffsetDateTime) -> Result<(), CooldownError> {
        let name = self.name.clone().filter(|name| *name != user.name);
        let username = self
            .username
            .clone()
            .filter(|username| *username != user.username);

        if name.is_some()
            && let Some(until) = cooldown_remaining(user.last_name_change, at)
        {
            return Err(CooldownError {
                field: "name",
                until,
            });
        }
        if username.is_some()
            && let Some(until) = cooldown_remaining(user.last_username_change, at)
        {
            return Err(CooldownError {
                field: "username",
                until,
            });
        }

        if let Some(name) = name {
            user.name = name;
            user.last_name_change = Some(at);
        }
        if let Some(username) = username {
            user.username = username;
            user.last_username_change = Some(at);
        }
        if let Some(profile) = &self.profile {
            user.profile = Some(profile.clone());
        }
        if let Some(cover) = &self.cover {
            user.cover = Some(cover.clone());
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(website) = &self.website {
            user.website = Some(website.clone());
        }
        if let Some(location) = &self.location {
            user.location = location.clone();
        }
        if let Some(work) = &self.work {
            user.work = work.clone();
        }
        if let Some(education) = &self.education {
            user.education = education.clone();
        }
        if let Some(social_links) = &self.social_links {
            user.social_links = social_links.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostListFilter {
    /// Approved collection, newest first.
    Approved,
    /// Awaiting review (not approved, not rejected), oldest first.
    Pending,
    /// Every post by one author regardless of state, newest first.
    ByAuthor(Uuid),
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, user: &UserRecord) -> Result<(), RepoError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;

    /// Users matching `ids`, in no particular order; unknown ids are skipped.
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, RepoError>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        at: OffsetDateTime,
    ) -> Result<UserRecord, MutationError<CooldownError>>;

    /// Run `op` on both documents and persist both, or neither.
    async fn apply_relationship(
        &self,
        actor: Uuid,
        target: Uuid,
        op: RelationshipOp,
    ) -> Result<RelationshipPair, MutationError<RelationshipError>>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn create_post(&self, post: &PostRecord) -> Result<(), RepoError>;

    /// Canonical copy from the all-posts collection.
    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// Copy from the approved collection, if the post is published.
    async fn find_approved_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn list_posts(&self, filter: PostListFilter) -> Result<Vec<PostRecord>, RepoError>;

    /// Run `op` on the canonical copy and mirror the outcome into the
    /// approved collection in the same unit of work.
    async fn apply_post_op(
        &self,
        id: Uuid,
        op: PostOp,
    ) -> Result<PostMutation, MutationError<PostRuleError>>;

    /// Remove a post from both collections.
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), RepoError>;

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError>;

    async fn revoke_session(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;

    /// Drop sessions that expired before `now`; returns how many were removed.
    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
