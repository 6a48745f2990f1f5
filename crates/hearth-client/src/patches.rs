//! Speculative transforms that mirror what the server does for each
//! mutation. They work on any cached payload and leave unrelated payloads
//! untouched, so one transform can be applied to every affected key.

use hearth_api_types::{CommentView, PostView, RelationshipState, RelationshipView, UserView};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::QueryData;

pub fn toggle_like(data: &mut QueryData, post_id: Uuid, user_id: Uuid) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == post_id) {
        if let Some(index) = post.liked_by.iter().position(|id| *id == user_id) {
            post.liked_by.remove(index);
        } else {
            post.liked_by.push(user_id);
        }
    }
}

/// Placeholder comment shown until the server assigns the real id.
pub fn pending_comment(author_id: Uuid, text: &str) -> CommentView {
    CommentView {
        id: Uuid::new_v4(),
        author_id,
        text: text.trim().to_string(),
        commented_at: OffsetDateTime::now_utc(),
        edited_at: None,
    }
}

pub fn append_comment(data: &mut QueryData, post_id: Uuid, comment: &CommentView) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == post_id) {
        if !post.comments.iter().any(|existing| existing.id == comment.id) {
            post.comments.push(comment.clone());
        }
    }
}

/// Swap the placeholder for the comment the server stored.
pub fn replace_comment(data: &mut QueryData, post_id: Uuid, placeholder: Uuid, stored: &CommentView) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == post_id) {
        for comment in post.comments.iter_mut().filter(|c| c.id == placeholder) {
            *comment = stored.clone();
        }
    }
}

pub fn remove_comment(data: &mut QueryData, post_id: Uuid, comment_id: Uuid) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == post_id) {
        post.comments.retain(|comment| comment.id != comment_id);
    }
}

pub fn edit_comment(
    data: &mut QueryData,
    post_id: Uuid,
    comment_id: Uuid,
    text: &str,
    at: OffsetDateTime,
) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == post_id) {
        for comment in post.comments.iter_mut().filter(|c| c.id == comment_id) {
            comment.text = text.trim().to_string();
            comment.edited_at = Some(at);
        }
    }
}

/// Copy a moderation decision onto any cached copy of the post.
pub fn set_moderation(data: &mut QueryData, decided: &PostView) {
    let Some(posts) = data.posts_mut() else {
        return;
    };
    for post in posts.iter_mut().filter(|post| post.id == decided.id) {
        post.moderation = decided.moderation;
        post.rejection_message = decided.rejection_message.clone();
        post.updated_at = decided.updated_at;
    }
}

pub fn remove_post(data: &mut QueryData, post_id: Uuid) {
    if let Some(posts) = data.posts_mut() {
        posts.retain(|post| post.id != post_id);
    }
}

/// A relationship change made by `viewer` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipChange {
    Follow,
    Unfollow,
    SendRequest,
    CancelRequest,
    /// `target` is the user who sent the request.
    AcceptRequest,
    RejectRequest,
    Unfriend,
}

/// Apply `change` to whichever side of the pair `data` describes: the
/// viewer's own document, the target's document, or the viewer's
/// relationship view of the target.
pub fn apply_relationship(data: &mut QueryData, viewer: Uuid, target: Uuid, change: RelationshipChange) {
    match data {
        QueryData::MyData(mine) if mine.user.id == viewer => {
            apply_to_user(&mut mine.user, target, change, Side::Actor);
        }
        QueryData::User(user) if user.id == viewer => {
            apply_to_user(user, target, change, Side::Actor);
        }
        QueryData::User(user) if user.id == target => {
            apply_to_user(user, viewer, change, Side::Target);
        }
        QueryData::Relationship(view) if view.target_id == target => {
            apply_to_view(view, change);
        }
        _ => {}
    }
}

#[derive(Clone, Copy)]
enum Side {
    Actor,
    Target,
}

fn add(list: &mut Vec<Uuid>, id: Uuid) {
    if !list.contains(&id) {
        list.push(id);
    }
}

fn pull(list: &mut Vec<Uuid>, id: Uuid) {
    list.retain(|existing| *existing != id);
}

fn apply_to_user(user: &mut UserView, other: Uuid, change: RelationshipChange, side: Side) {
    use RelationshipChange::*;

    match (change, side) {
        (Follow, Side::Actor) => add(&mut user.following, other),
        (Follow, Side::Target) => add(&mut user.followers, other),
        (Unfollow, Side::Actor) => pull(&mut user.following, other),
        (Unfollow, Side::Target) => pull(&mut user.followers, other),
        (SendRequest, Side::Actor) => add(&mut user.sent_requests, other),
        (SendRequest, Side::Target) => add(&mut user.pending_requests, other),
        (CancelRequest, Side::Actor) => pull(&mut user.sent_requests, other),
        (CancelRequest, Side::Target) => pull(&mut user.pending_requests, other),
        (AcceptRequest, Side::Actor) => {
            pull(&mut user.pending_requests, other);
            add(&mut user.friends, other);
        }
        (AcceptRequest, Side::Target) => {
            pull(&mut user.sent_requests, other);
            add(&mut user.friends, other);
        }
        (RejectRequest, _) => {
            pull(&mut user.pending_requests, other);
            pull(&mut user.sent_requests, other);
        }
        (Unfriend, _) => pull(&mut user.friends, other),
    }
}

fn apply_to_view(view: &mut RelationshipView, change: RelationshipChange) {
    match change {
        RelationshipChange::Follow => view.following = true,
        RelationshipChange::Unfollow => view.following = false,
        RelationshipChange::SendRequest => view.state = RelationshipState::RequestSent,
        RelationshipChange::AcceptRequest => view.state = RelationshipState::Friends,
        RelationshipChange::CancelRequest
        | RelationshipChange::RejectRequest
        | RelationshipChange::Unfriend => view.state = RelationshipState::None,
    }
}

#[cfg(test)]
mod tests {
    use hearth_api_types::{Location, ModerationState, MyDataResponse, UserRole};

    use super::*;

    fn user(id: Uuid) -> UserView {
        UserView {
            id,
            name: "Ada".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            role: UserRole::User,
            profile: None,
            cover: None,
            bio: None,
            phone: None,
            website: None,
            location: Location::default(),
            work: Vec::new(),
            education: Vec::new(),
            social_links: Vec::new(),
            friends: Vec::new(),
            following: Vec::new(),
            followers: Vec::new(),
            pending_requests: Vec::new(),
            sent_requests: Vec::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn post(id: Uuid, author_id: Uuid) -> PostView {
        PostView {
            id,
            author_id,
            author: None,
            caption: Some("hello".into()),
            image: None,
            liked_by: Vec::new(),
            comments: Vec::new(),
            moderation: ModerationState::Approved,
            rejection_message: None,
            posted_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn like_toggles_in_bare_lists_and_my_data() {
        let (me, post_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut feed = QueryData::Posts(vec![post(post_id, me)]);
        let mut mine = QueryData::MyData(MyDataResponse {
            user: user(me),
            posts: vec![post(post_id, me)],
        });

        toggle_like(&mut feed, post_id, me);
        toggle_like(&mut mine, post_id, me);
        assert_eq!(feed.posts().unwrap()[0].liked_by, vec![me]);
        assert_eq!(mine.posts().unwrap()[0].liked_by, vec![me]);

        toggle_like(&mut feed, post_id, me);
        assert!(feed.posts().unwrap()[0].liked_by.is_empty());
    }

    #[test]
    fn placeholder_comment_is_replaced_then_removed() {
        let (me, post_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut feed = QueryData::Posts(vec![post(post_id, me)]);

        let placeholder = pending_comment(me, "  hi ");
        append_comment(&mut feed, post_id, &placeholder);
        append_comment(&mut feed, post_id, &placeholder);
        assert_eq!(feed.posts().unwrap()[0].comments.len(), 1);
        assert_eq!(feed.posts().unwrap()[0].comments[0].text, "hi");

        let stored = CommentView {
            id: Uuid::new_v4(),
            ..placeholder.clone()
        };
        replace_comment(&mut feed, post_id, placeholder.id, &stored);
        assert_eq!(feed.posts().unwrap()[0].comments[0].id, stored.id);

        edit_comment(&mut feed, post_id, stored.id, "edited", OffsetDateTime::UNIX_EPOCH);
        assert_eq!(feed.posts().unwrap()[0].comments[0].text, "edited");
        assert!(feed.posts().unwrap()[0].comments[0].edited_at.is_some());

        remove_comment(&mut feed, post_id, stored.id);
        assert!(feed.posts().unwrap()[0].comments.is_empty());
    }

    #[test]
    fn accept_updates_both_documents_and_the_view() {
        let (me, requester) = (Uuid::new_v4(), Uuid::new_v4());
        let mut mine = user(me);
        mine.pending_requests.push(requester);
        let mut mine = QueryData::MyData(MyDataResponse {
            user: mine,
            posts: Vec::new(),
        });
        let mut theirs = user(requester);
        theirs.sent_requests.push(me);
        let mut theirs = QueryData::User(theirs);
        let mut view = QueryData::Relationship(RelationshipView {
            target_id: requester,
            state: RelationshipState::RequestReceived,
            following: false,
            followed_by: false,
        });

        for data in [&mut mine, &mut theirs, &mut view] {
            apply_relationship(data, me, requester, RelationshipChange::AcceptRequest);
        }

        let QueryData::MyData(mine) = mine else { unreachable!() };
        assert_eq!(mine.user.friends, vec![requester]);
        assert!(mine.user.pending_requests.is_empty());
        let QueryData::User(theirs) = theirs else { unreachable!() };
        assert_eq!(theirs.friends, vec![me]);
        assert!(theirs.sent_requests.is_empty());
        let QueryData::Relationship(view) = view else { unreachable!() };
        assert_eq!(view.state, RelationshipState::Friends);
    }

    #[test]
    fn follow_is_idempotent_and_ignores_unrelated_users() {
        let (me, target, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut theirs = QueryData::User(user(target));
        let mut other = QueryData::User(user(stranger));

        apply_relationship(&mut theirs, me, target, RelationshipChange::Follow);
        apply_relationship(&mut theirs, me, target, RelationshipChange::Follow);
        apply_relationship(&mut other, me, target, RelationshipChange::Follow);

        let QueryData::User(theirs) = theirs else { unreachable!() };
        assert_eq!(theirs.followers, vec![me]);
        let QueryData::User(other) = other else { unreachable!() };
        assert!(other.followers.is_empty());
    }
}
