use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{MutationError, RelationshipPair, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::relationships::{RelationshipError, RelationshipOp, relationship_state};
use crate::domain::types::RelationshipState;

#[derive(Debug, Error)]
pub enum SocialServiceError {
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Rule(RelationshipError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for SocialServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

impl From<MutationError<RelationshipError>> for SocialServiceError {
    fn from(value: MutationError<RelationshipError>) -> Self {
        match value {
            MutationError::Rejected(rule) => {
                counter!("hearth_mutation_rejected_total", "kind" => "relationship").increment(1);
                Self::Rule(rule)
            }
            MutationError::Repo(err) => err.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub target_id: Uuid,
    pub state: RelationshipState,
    pub following: bool,
    pub followed_by: bool,
}

impl Relationship {
    pub fn between(viewer: &UserRecord, target_id: Uuid) -> Self {
        Self {
            target_id,
            state: relationship_state(viewer, target_id),
            following: viewer.following.contains(&target_id),
            followed_by: viewer.followers.contains(&target_id),
        }
    }
}

/// Friend requests and follows. Every operation updates both users.
#[derive(Clone)]
pub struct SocialService {
    users: Arc<dyn UsersRepo>,
}

impl SocialService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn send_request(
        &self,
        actor: &UserRecord,
        target: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, target, RelationshipOp::SendRequest).await
    }

    pub async fn cancel_request(
        &self,
        actor: &UserRecord,
        target: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, target, RelationshipOp::CancelRequest).await
    }

    /// `actor` accepts the request `requester` sent earlier.
    pub async fn accept_request(
        &self,
        actor: &UserRecord,
        requester: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, requester, RelationshipOp::AcceptRequest)
            .await
    }

    pub async fn reject_request(
        &self,
        actor: &UserRecord,
        requester: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, requester, RelationshipOp::RejectRequest)
            .await
    }

    pub async fn unfriend(
        &self,
        actor: &UserRecord,
        target: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, target, RelationshipOp::Unfriend).await
    }

    pub async fn follow(
        &self,
        actor: &UserRecord,
        target: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, target, RelationshipOp::Follow).await
    }

    pub async fn unfollow(
        &self,
        actor: &UserRecord,
        target: Uuid,
    ) -> Result<RelationshipPair, SocialServiceError> {
        self.apply(actor, target, RelationshipOp::Unfollow).await
    }

    pub async fn relationship(
        &self,
        viewer: &UserRecord,
        target: Uuid,
    ) -> Result<Relationship, SocialServiceError> {
        if viewer.id != target && self.users.find_user(target).await?.is_none() {
            return Err(SocialServiceError::NotFound);
        }
        Ok(Relationship::between(viewer, target))
    }

    async fn apply(
        &self,
        actor: &UserRecord,
        target: Uuid,
        op: RelationshipOp,
    ) -> Result<RelationshipPair, SocialServiceError> {
        let pair = self.users.apply_relationship(actor.id, target, op).await?;

        counter!("hearth_relationship_mutation_total", "op" => op.as_str()).increment(1);
        info!(
            target = "hearth::social",
            actor_id = %actor.id,
            target_id = %target,
            op = op.as_str(),
            "relationship updated"
        );
        Ok(pair)
    }
}
