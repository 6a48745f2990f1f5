//! Friendship and follow bookkeeping between two user documents.
//!
//! Relationship arrays have set semantics. Every transition updates both
//! documents so that `friends` stays symmetric, `pending_requests` on the
//! receiver mirrors `sent_requests` on the sender, and `following` mirrors
//! `followers`. Stores run a transition on both records under one lock or
//! transaction and persist both or neither.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::UserRecord;
use crate::domain::types::RelationshipState;

/// Insert `id` unless present. Returns `true` when the set changed.
pub fn add_to_set(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    if set.contains(&id) {
        false
    } else {
        set.push(id);
        true
    }
}

/// Remove every occurrence of `id`. Returns `true` when the set changed.
pub fn pull(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = set.len();
    set.retain(|existing| *existing != id);
    set.len() != before
}

/// Flip membership of `id`, returning the new membership.
pub fn toggle(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    if pull(set, id) {
        false
    } else {
        set.push(id);
        true
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RelationshipError {
    #[error("cannot target your own account")]
    SelfTarget,
    #[error("already friends")]
    AlreadyFriends,
    #[error("friend request already sent")]
    AlreadyRequested,
    #[error("this user already sent you a friend request")]
    IncomingRequestPending,
    #[error("no pending friend request from this user")]
    NoPendingRequest,
    #[error("no friend request sent to this user")]
    NoSentRequest,
    #[error("not friends with this user")]
    NotFriends,
}

/// A transition performed by `actor` against `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipOp {
    SendRequest,
    CancelRequest,
    AcceptRequest,
    RejectRequest,
    Unfriend,
    Follow,
    Unfollow,
}

impl RelationshipOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendRequest => "send_request",
            Self::CancelRequest => "cancel_request",
            Self::AcceptRequest => "accept_request",
            Self::RejectRequest => "reject_request",
            Self::Unfriend => "unfriend",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
        }
    }

    /// Validate the precondition and update both documents in place.
    ///
    /// On error neither record has been modified.
    pub fn apply(
        self,
        actor: &mut UserRecord,
        target: &mut UserRecord,
    ) -> Result<(), RelationshipError> {
        if actor.id == target.id {
            return Err(RelationshipError::SelfTarget);
        }

        match self {
            Self::SendRequest => {
                if actor.friends.contains(&target.id) || target.friends.contains(&actor.id) {
                    return Err(RelationshipError::AlreadyFriends);
                }
                if target.pending_requests.contains(&actor.id)
                    || actor.sent_requests.contains(&target.id)
                {
                    return Err(RelationshipError::AlreadyRequested);
                }
                if actor.pending_requests.contains(&target.id) {
                    return Err(RelationshipError::IncomingRequestPending);
                }
                add_to_set(&mut target.pending_requests, actor.id);
                add_to_set(&mut actor.sent_requests, target.id);
            }
            Self::CancelRequest => {
                if !actor.sent_requests.contains(&target.id) {
                    return Err(RelationshipError::NoSentRequest);
                }
                pull(&mut actor.sent_requests, target.id);
                pull(&mut target.pending_requests, actor.id);
            }
            Self::AcceptRequest => {
                if !actor.pending_requests.contains(&target.id) {
                    return Err(RelationshipError::NoPendingRequest);
                }
                add_to_set(&mut actor.friends, target.id);
                add_to_set(&mut target.friends, actor.id);
                pull(&mut actor.pending_requests, target.id);
                pull(&mut target.sent_requests, actor.id);
            }
            Self::RejectRequest => {
                if !actor.pending_requests.contains(&target.id) {
                    return Err(RelationshipError::NoPendingRequest);
                }
                pull(&mut actor.pending_requests, target.id);
                pull(&mut target.sent_requests, actor.id);
            }
            Self::Unfriend => {
                if !actor.friends.contains(&target.id) && !target.friends.contains(&actor.id) {
                    return Err(RelationshipError::NotFriends);
                }
                pull(&mut actor.friends, target.id);
                pull(&mut target.friends, actor.id);
            }
            Self::Follow => {
                add_to_set(&mut actor.following, target.id);
                add_to_set(&mut target.followers, actor.id);
            }
            Self::Unfollow => {
                pull(&mut actor.following, target.id);
                pull(&mut target.followers, actor.id);
            }
        }

        Ok(())
    }
}

/// How `viewer` relates to `target_id`, from the viewer's own document.
pub fn relationship_state(viewer: &UserRecord, target_id: Uuid) -> RelationshipState {
    if viewer.id == target_id {
        RelationshipState::SelfView
    } else if viewer.friends.contains(&target_id) {
        RelationshipState::Friends
    } else if viewer.sent_requests.contains(&target_id) {
        RelationshipState::RequestSent
    } else if viewer.pending_requests.contains(&target_id) {
        RelationshipState::RequestReceived
    } else {
        RelationshipState::None
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user(name: &str) -> UserRecord {
        UserRecord::new(
            format!("{name}@example.com"),
            name.to_string(),
            name.to_string(),
            None,
            None,
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn set_helpers_have_set_semantics() {
        let id = Uuid::new_v4();
        let mut set = Vec::new();
        assert!(add_to_set(&mut set, id));
        assert!(!add_to_set(&mut set, id));
        assert_eq!(set.len(), 1);
        assert!(!toggle(&mut set, id));
        assert!(set.is_empty());
        assert!(toggle(&mut set, id));
        assert!(pull(&mut set, id));
        assert!(!pull(&mut set, id));
    }

    #[test]
    fn send_then_accept_mirrors_both_documents() {
        let mut alice = user("alice");
        let mut bob = user("bob");

        RelationshipOp::SendRequest
            .apply(&mut alice, &mut bob)
            .expect("send");
        assert_eq!(alice.sent_requests, vec![bob.id]);
        assert_eq!(bob.pending_requests, vec![alice.id]);

        RelationshipOp::AcceptRequest
            .apply(&mut bob, &mut alice)
            .expect("accept");
        assert_eq!(bob.friends, vec![alice.id]);
        assert_eq!(alice.friends, vec![bob.id]);
        assert!(bob.pending_requests.is_empty());
        assert!(alice.sent_requests.is_empty());
    }

    #[test]
    fn duplicate_and_crossed_requests_are_refused() {
        let mut alice = user("alice");
        let mut bob = user("bob");

        RelationshipOp::SendRequest
            .apply(&mut alice, &mut bob)
            .expect("send");
        assert_eq!(
            RelationshipOp::SendRequest.apply(&mut alice, &mut bob),
            Err(RelationshipError::AlreadyRequested)
        );
        assert_eq!(
            RelationshipOp::SendRequest.apply(&mut bob, &mut alice),
            Err(RelationshipError::IncomingRequestPending)
        );
    }

    #[test]
    fn friends_cannot_request_again() {
        let mut alice = user("alice");
        let mut bob = user("bob");
        RelationshipOp::SendRequest.apply(&mut alice, &mut bob).unwrap();
        RelationshipOp::AcceptRequest.apply(&mut bob, &mut alice).unwrap();

        assert_eq!(
            RelationshipOp::SendRequest.apply(&mut alice, &mut bob),
            Err(RelationshipError::AlreadyFriends)
        );
    }

    #[test]
    fn accept_without_request_leaves_documents_untouched() {
        let mut alice = user("alice");
        let mut bob = user("bob");
        let before = (alice.clone(), bob.clone());

        assert_eq!(
            RelationshipOp::AcceptRequest.apply(&mut bob, &mut alice),
            Err(RelationshipError::NoPendingRequest)
        );
        assert_eq!((alice, bob), before);
    }

    #[test]
    fn reject_and_cancel_clear_both_sides() {
        let mut alice = user("alice");
        let mut bob = user("bob");

        RelationshipOp::SendRequest.apply(&mut alice, &mut bob).unwrap();
        RelationshipOp::RejectRequest.apply(&mut bob, &mut alice).unwrap();
        assert!(bob.pending_requests.is_empty());
        assert!(alice.sent_requests.is_empty());

        RelationshipOp::SendRequest.apply(&mut alice, &mut bob).unwrap();
        RelationshipOp::CancelRequest.apply(&mut alice, &mut bob).unwrap();
        assert!(bob.pending_requests.is_empty());
        assert!(alice.sent_requests.is_empty());

        assert_eq!(
            RelationshipOp::CancelRequest.apply(&mut alice, &mut bob),
            Err(RelationshipError::NoSentRequest)
        );
    }

    #[test]
    fn follow_is_idempotent_and_mirrored() {
        let mut alice = user("alice");
        let mut bob = user("bob");

        RelationshipOp::Follow.apply(&mut alice, &mut bob).unwrap();
        RelationshipOp::Follow.apply(&mut alice, &mut bob).unwrap();
        assert_eq!(alice.following, vec![bob.id]);
        assert_eq!(bob.followers, vec![alice.id]);

        RelationshipOp::Unfollow.apply(&mut alice, &mut bob).unwrap();
        assert!(alice.following.is_empty());
        assert!(bob.followers.is_empty());
    }

    #[test]
    fn self_targeting_is_refused() {
        let mut alice = user("alice");
        let mut twin = alice.clone();
        assert_eq!(
            RelationshipOp::Follow.apply(&mut alice, &mut twin),
            Err(RelationshipError::SelfTarget)
        );
    }

    #[test]
    fn state_reflects_viewer_document() {
        let mut alice = user("alice");
        let mut bob = user("bob");
        assert_eq!(relationship_state(&alice, alice.id), RelationshipState::SelfView);
        assert_eq!(relationship_state(&alice, bob.id), RelationshipState::None);

        RelationshipOp::SendRequest.apply(&mut alice, &mut bob).unwrap();
        assert_eq!(relationship_state(&alice, bob.id), RelationshipState::RequestSent);
        assert_eq!(
            relationship_state(&bob, alice.id),
            RelationshipState::RequestReceived
        );

        RelationshipOp::AcceptRequest.apply(&mut bob, &mut alice).unwrap();
        assert_eq!(relationship_state(&alice, bob.id), RelationshipState::Friends);
    }
}
