use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    MutationError, PostListFilter, PostMutation, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{
    LikeOutcome, PostContent, PostEffect, PostOp, PostRuleError, validate_comment,
};

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post not found")]
    NotFound,
    #[error("moderator role required")]
    Forbidden,
    #[error(transparent)]
    Rule(PostRuleError),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for PostServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

impl From<MutationError<PostRuleError>> for PostServiceError {
    fn from(value: MutationError<PostRuleError>) -> Self {
        match value {
            MutationError::Rejected(PostRuleError::NotVisible) => Self::NotFound,
            MutationError::Rejected(rule) => {
                counter!("hearth_mutation_rejected_total", "kind" => "post").increment(1);
                Self::Rule(rule)
            }
            MutationError::Repo(err) => err.into(),
        }
    }
}

/// A post joined with its author's public profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PostWithAuthor {
    pub post: PostRecord,
    pub author: Option<UserRecord>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { posts, users }
    }

    /// Approved posts, newest first, each joined with its author.
    pub async fn feed(&self) -> Result<Vec<PostWithAuthor>, PostServiceError> {
        let posts = self.posts.list_posts(PostListFilter::Approved).await?;
        self.attach_authors(posts).await
    }

    /// Posts waiting for a moderator, oldest first.
    pub async fn pending(
        &self,
        moderator: &UserRecord,
    ) -> Result<Vec<PostWithAuthor>, PostServiceError> {
        ensure_moderator(moderator)?;
        let posts = self.posts.list_posts(PostListFilter::Pending).await?;
        self.attach_authors(posts).await
    }

    /// Every post by `author` regardless of moderation state.
    pub async fn by_author(&self, author: &UserRecord) -> Result<Vec<PostRecord>, PostServiceError> {
        Ok(self
            .posts
            .list_posts(PostListFilter::ByAuthor(author.id))
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<PostRecord, PostServiceError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        caption: Option<String>,
        image: Option<String>,
    ) -> Result<PostRecord, PostServiceError> {
        let content = PostContent::new(caption, image)?;
        let post = PostRecord::new(
            author.id,
            content.caption,
            content.image,
            OffsetDateTime::now_utc(),
        );
        self.posts.create_post(&post).await?;

        info!(
            target = "hearth::posts",
            post_id = %post.id,
            author_id = %author.id,
            "post submitted for review"
        );
        Ok(post)
    }

    pub async fn edit(
        &self,
        actor: &UserRecord,
        id: Uuid,
        caption: Option<String>,
        image: Option<String>,
    ) -> Result<PostRecord, PostServiceError> {
        let content = PostContent::new(caption, image)?;
        let mutation = self
            .apply(
                id,
                PostOp::Edit {
                    actor: actor.id,
                    content,
                    at: OffsetDateTime::now_utc(),
                },
            )
            .await?;
        Ok(mutation.post)
    }

    /// Authors delete their own posts; moderators may delete any post.
    pub async fn delete(&self, actor: &UserRecord, id: Uuid) -> Result<(), PostServiceError> {
        let post = self.get(id).await?;
        if post.author_id != actor.id && !actor.is_admin() {
            return Err(PostServiceError::Rule(PostRuleError::NotAuthor));
        }
        self.posts.delete_post(id).await?;

        info!(
            target = "hearth::posts",
            post_id = %id,
            actor_id = %actor.id,
            "post deleted"
        );
        Ok(())
    }

    pub async fn approve(
        &self,
        moderator: &UserRecord,
        id: Uuid,
    ) -> Result<PostRecord, PostServiceError> {
        ensure_moderator(moderator)?;
        let mutation = self
            .apply(
                id,
                PostOp::Approve {
                    at: OffsetDateTime::now_utc(),
                },
            )
            .await?;

        counter!("hearth_moderation_decision_total", "decision" => "approve").increment(1);
        info!(
            target = "hearth::moderation",
            post_id = %id,
            moderator_id = %moderator.id,
            "post approved"
        );
        Ok(mutation.post)
    }

    pub async fn reject(
        &self,
        moderator: &UserRecord,
        id: Uuid,
    ) -> Result<PostRecord, PostServiceError> {
        ensure_moderator(moderator)?;
        let mutation = self
            .apply(
                id,
                PostOp::Reject {
                    at: OffsetDateTime::now_utc(),
                },
            )
            .await?;

        counter!("hearth_moderation_decision_total", "decision" => "reject").increment(1);
        info!(
            target = "hearth::moderation",
            post_id = %id,
            moderator_id = %moderator.id,
            "post rejected"
        );
        Ok(mutation.post)
    }

    pub async fn toggle_like(
        &self,
        actor: &UserRecord,
        id: Uuid,
    ) -> Result<LikeOutcome, PostServiceError> {
        let mutation = self
            .apply(
                id,
                PostOp::ToggleLike {
                    user_id: actor.id,
                    moderator: actor.is_admin(),
                },
            )
            .await?;
        match mutation.effect {
            PostEffect::Like(outcome) => Ok(outcome),
            other => Err(unexpected_effect("toggle_like", &other)),
        }
    }

    pub async fn add_comment(
        &self,
        actor: &UserRecord,
        id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, PostServiceError> {
        let text = validate_comment(text)?;
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            author_id: actor.id,
            text,
            commented_at: OffsetDateTime::now_utc(),
            edited_at: None,
        };
        let mutation = self
            .apply(
                id,
                PostOp::AddComment {
                    comment,
                    moderator: actor.is_admin(),
                },
            )
            .await?;
        match mutation.effect {
            PostEffect::CommentAdded(comment) => Ok(comment),
            other => Err(unexpected_effect("add_comment", &other)),
        }
    }

    pub async fn edit_comment(
        &self,
        actor: &UserRecord,
        id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, PostServiceError> {
        let text = validate_comment(text)?;
        let mutation = self
            .apply(
                id,
                PostOp::EditComment {
                    comment_id,
                    actor: actor.id,
                    text,
                    at: OffsetDateTime::now_utc(),
                },
            )
            .await?;
        match mutation.effect {
            PostEffect::CommentEdited(comment) => Ok(comment),
            other => Err(unexpected_effect("edit_comment", &other)),
        }
    }

    pub async fn delete_comment(
        &self,
        actor: &UserRecord,
        id: Uuid,
        comment_id: Uuid,
    ) -> Result<CommentRecord, PostServiceError> {
        let mutation = self
            .apply(
                id,
                PostOp::DeleteComment {
                    comment_id,
                    actor: actor.id,
                    moderator: actor.is_admin(),
                },
            )
            .await?;
        match mutation.effect {
            PostEffect::CommentRemoved(comment) => Ok(comment),
            other => Err(unexpected_effect("delete_comment", &other)),
        }
    }

    async fn apply(&self, id: Uuid, op: PostOp) -> Result<PostMutation, PostServiceError> {
        let label = op.as_str();
        let mutation = self.posts.apply_post_op(id, op).await?;
        counter!("hearth_post_mutation_total", "op" => label).increment(1);
        Ok(mutation)
    }

    async fn attach_authors(
        &self,
        posts: Vec<PostRecord>,
    ) -> Result<Vec<PostWithAuthor>, PostServiceError> {
        let mut author_ids: Vec<Uuid> = posts.iter().map(|post| post.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<Uuid, UserRecord> = if author_ids.is_empty() {
            HashMap::new()
        } else {
            self.users
                .find_users(&author_ids)
                .await?
                .into_iter()
                .map(|user| (user.id, user))
                .collect()
        };

        Ok(posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.author_id).cloned();
                if author.is_none() {
                    warn!(
                        target = "hearth::posts",
                        post_id = %post.id,
                        author_id = %post.author_id,
                        "post author is missing"
                    );
                }
                PostWithAuthor { post, author }
            })
            .collect())
    }
}

fn ensure_moderator(user: &UserRecord) -> Result<(), PostServiceError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(PostServiceError::Forbidden)
    }
}

fn unexpected_effect(op: &'static str, effect: &PostEffect) -> PostServiceError {
    PostServiceError::Repo(RepoError::Integrity {
        message: format!("{op} produced unexpected effect {effect:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ModerationState, UserRole};
    use crate::infra::memory::MemoryRepositories;

    struct Fixture {
        repo: Arc<MemoryRepositories>,
        posts: PostService,
        author: UserRecord,
        reader: UserRecord,
        admin: UserRecord,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepositories::new());
        let now = OffsetDateTime::now_utc();
        let author = UserRecord::new(
            "author@example.com".into(),
            "author".into(),
            "Author".into(),
            None,
            None,
            now,
        );
        let reader = UserRecord::new(
            "reader@example.com".into(),
            "reader".into(),
            "Reader".into(),
            None,
            None,
            now,
        );
        let mut admin = UserRecord::new(
            "admin@example.com".into(),
            "admin".into(),
            "Admin".into(),
            None,
            None,
            now,
        );
        admin.role = UserRole::Admin;
        for user in [&author, &reader, &admin] {
            repo.put_user(user.clone()).await;
        }
        Fixture {
            posts: PostService::new(repo.clone(), repo.clone()),
            repo,
            author,
            reader,
            admin,
        }
    }

    #[tokio::test]
    async fn approval_copies_post_into_feed() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("hello".into()), None)
            .await
            .unwrap();
        assert!(f.posts.feed().await.unwrap().is_empty());

        let pending = f.posts.pending(&f.admin).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].author.as_ref().map(|a| a.id), Some(f.author.id));

        f.posts.approve(&f.admin, post.id).await.unwrap();
        let feed = f.posts.feed().await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.moderation_state(), ModerationState::Approved);
        assert!(f.posts.pending(&f.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_moderators_review() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("hello".into()), None)
            .await
            .unwrap();
        assert!(matches!(
            f.posts.approve(&f.reader, post.id).await,
            Err(PostServiceError::Forbidden)
        ));
        assert!(matches!(
            f.posts.pending(&f.author).await,
            Err(PostServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn rejected_post_never_reaches_feed() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("spam".into()), None)
            .await
            .unwrap();
        let rejected = f.posts.reject(&f.admin, post.id).await.unwrap();
        assert_eq!(rejected.moderation_state(), ModerationState::Rejected);

        // Liking and commenting do not promote it.
        f.posts.toggle_like(&f.author, post.id).await.unwrap();
        f.posts
            .add_comment(&f.author, post.id, "please reconsider")
            .await
            .unwrap();

        assert!(f.posts.feed().await.unwrap().is_empty());
        assert!(f.repo.find_approved_post(post.id).await.unwrap().is_none());
        assert!(f.posts.pending(&f.admin).await.unwrap().is_empty());

        // Editing sends it back to the queue, still unpublished.
        f.posts
            .edit(&f.author, post.id, Some("ham".into()), None)
            .await
            .unwrap();
        assert_eq!(f.posts.pending(&f.admin).await.unwrap().len(), 1);
        assert!(f.posts.feed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn likes_and_comments_update_both_collections() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("hello".into()), None)
            .await
            .unwrap();
        f.posts.approve(&f.admin, post.id).await.unwrap();

        let liked = f.posts.toggle_like(&f.reader, post.id).await.unwrap();
        assert!(liked.liked);
        let comment = f
            .posts
            .add_comment(&f.reader, post.id, "great")
            .await
            .unwrap();

        let canonical = f.repo.find_post(post.id).await.unwrap().unwrap();
        let copy = f.repo.find_approved_post(post.id).await.unwrap().unwrap();
        assert_eq!(canonical.liked_by, vec![f.reader.id]);
        assert_eq!(copy.liked_by, vec![f.reader.id]);
        assert_eq!(copy.comments.len(), 1);

        f.posts
            .delete_comment(&f.reader, post.id, comment.id)
            .await
            .unwrap();
        let canonical = f.repo.find_post(post.id).await.unwrap().unwrap();
        let copy = f.repo.find_approved_post(post.id).await.unwrap().unwrap();
        assert!(canonical.comments.is_empty());
        assert!(copy.comments.is_empty());

        let unliked = f.posts.toggle_like(&f.reader, post.id).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.like_count, 0);
    }

    #[tokio::test]
    async fn pending_posts_are_hidden_from_other_users() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("draft".into()), None)
            .await
            .unwrap();
        assert!(matches!(
            f.posts.toggle_like(&f.reader, post.id).await,
            Err(PostServiceError::NotFound)
        ));
        assert!(matches!(
            f.posts.add_comment(&f.reader, post.id, "hi").await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn rejecting_a_published_post_pulls_it_from_the_feed() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("hello".into()), None)
            .await
            .unwrap();
        f.posts.approve(&f.admin, post.id).await.unwrap();
        f.posts.toggle_like(&f.reader, post.id).await.unwrap();

        let rejected = f.posts.reject(&f.admin, post.id).await.unwrap();
        assert_eq!(rejected.moderation_state(), ModerationState::Rejected);
        assert!(f.posts.feed().await.unwrap().is_empty());
        assert!(f.repo.find_approved_post(post.id).await.unwrap().is_none());
        assert!(matches!(
            f.posts.toggle_like(&f.reader, post.id).await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_removes_both_copies_and_checks_author() {
        let f = fixture().await;
        let post = f
            .posts
            .create(&f.author, Some("bye".into()), None)
            .await
            .unwrap();
        f.posts.approve(&f.admin, post.id).await.unwrap();

        assert!(matches!(
            f.posts.delete(&f.reader, post.id).await,
            Err(PostServiceError::Rule(PostRuleError::NotAuthor))
        ));
        f.posts.delete(&f.author, post.id).await.unwrap();
        assert!(f.repo.find_post(post.id).await.unwrap().is_none());
        assert!(f.repo.find_approved_post(post.id).await.unwrap().is_none());
        assert!(matches!(
            f.posts.delete(&f.author, post.id).await,
            Err(PostServiceError::NotFound)
        ));
    }
}
