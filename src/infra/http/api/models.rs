//! Conversions from domain records to wire types.

use hearth_api_types::{
    AuthorView, CommentView, MyDataResponse, PostView, RelationshipView, UserView,
};

use crate::application::posts::PostWithAuthor;
use crate::application::social::Relationship;
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};

pub fn user_view(user: &UserRecord) -> UserView {
    UserView {
        id: user.id,
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
        profile: user.profile.clone(),
        cover: user.cover.clone(),
        bio: user.bio.clone(),
        phone: user.phone.clone(),
        website: user.website.clone(),
        location: user.location.clone(),
        work: user.work.clone(),
        education: user.education.clone(),
        social_links: user.social_links.clone(),
        friends: user.friends.clone(),
        following: user.following.clone(),
        followers: user.followers.clone(),
        pending_requests: user.pending_requests.clone(),
        sent_requests: user.sent_requests.clone(),
        created_at: user.created_at,
    }
}

pub fn author_view(user: &UserRecord) -> AuthorView {
    AuthorView {
        id: user.id,
        name: user.name.clone(),
        username: user.username.clone(),
        profile: user.profile.clone(),
    }
}

pub fn comment_view(comment: &CommentRecord) -> CommentView {
    CommentView {
        id: comment.id,
        author_id: comment.author_id,
        text: comment.text.clone(),
        commented_at: comment.commented_at,
        edited_at: comment.edited_at,
    }
}

pub fn post_view(post: &PostRecord, author: Option<&UserRecord>) -> PostView {
    PostView {
        id: post.id,
        author_id: post.author_id,
        author: author.map(author_view),
        caption: post.caption.clone(),
        image: post.image.clone(),
        liked_by: post.liked_by.clone(),
        comments: post.comments.iter().map(comment_view).collect(),
        moderation: post.moderation_state(),
        rejection_message: post.rejection.clone(),
        posted_at: post.posted_at,
        updated_at: post.updated_at,
    }
}

pub fn joined_post_views(posts: &[PostWithAuthor]) -> Vec<PostView> {
    posts
        .iter()
        .map(|entry| post_view(&entry.post, entry.author.as_ref()))
        .collect()
}

pub fn my_data(user: &UserRecord, posts: &[PostRecord]) -> MyDataResponse {
    MyDataResponse {
        user: user_view(user),
        posts: posts.iter().map(|post| post_view(post, Some(user))).collect(),
    }
}

pub fn relationship_view(relationship: Relationship) -> RelationshipView {
    RelationshipView {
        target_id: relationship.target_id,
        state: relationship.state,
        following: relationship.following,
        followed_by: relationship.followed_by,
    }
}
