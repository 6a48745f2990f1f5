//! In-process store used by tests and by `--storage memory`.
//!
//! All four collections sit behind one `RwLock`, so multi-document writes
//! (both sides of a relationship, a post and its approved copy) happen under
//! a single write guard and are never observed half-applied.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    HealthRepo, MutationError, PostListFilter, PostMutation, PostsRepo, ProfileChanges,
    RelationshipPair, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::posts::{PostOp, PostRuleError};
use crate::domain::relationships::{RelationshipError, RelationshipOp};
use crate::domain::sessions::SessionRecord;
use crate::domain::usernames::CooldownError;

const USERS_EMAIL_KEY: &str = "users_email_key";
const USERS_USERNAME_KEY: &str = "users_username_key";
const SESSIONS_PREFIX_KEY: &str = "sessions_prefix_key";

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<Uuid, UserRecord>,
    posts: HashMap<Uuid, PostRecord>,
    approved: HashMap<Uuid, PostRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
}

impl Collections {
    fn unique_violation(&self, user: &UserRecord) -> Option<&'static str> {
        self.users
            .values()
            .filter(|existing| existing.id != user.id)
            .find_map(|existing| {
                if existing.email == user.email {
                    Some(USERS_EMAIL_KEY)
                } else if existing.username == user.username {
                    Some(USERS_USERNAME_KEY)
                } else {
                    None
                }
            })
    }

    fn sync_approved(&mut self, post: &PostRecord) {
        if post.approved {
            self.approved.insert(post.id, post.clone());
        } else {
            self.approved.remove(&post.id);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepositories {
    inner: RwLock<Collections>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user without uniqueness checks; used to seed state.
    pub async fn put_user(&self, user: UserRecord) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Insert or replace a post, keeping the approved copy in step.
    pub async fn put_post(&self, post: PostRecord) {
        let mut guard = self.inner.write().await;
        guard.sync_approved(&post);
        guard.posts.insert(post.id, post);
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn create_user(&self, user: &UserRecord) -> Result<(), RepoError> {
        let mut guard = self.inner.write().await;
        if guard.users.contains_key(&user.id) {
            return Err(RepoError::Duplicate {
                constraint: "users_pkey".to_string(),
            });
        }
        if let Some(constraint) = guard.unique_violation(user) {
            return Err(RepoError::Duplicate {
                constraint: constraint.to_string(),
            });
        }
        guard.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let guard = self.inner.read().await;
        Ok(guard.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let guard = self.inner.read().await;
        Ok(guard
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, RepoError> {
        let guard = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| guard.users.get(id).cloned())
            .collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        at: OffsetDateTime,
    ) -> Result<UserRecord, MutationError<CooldownError>> {
        let mut guard = self.inner.write().await;
        let mut updated = guard.users.get(&id).cloned().ok_or(RepoError::NotFound)?;
        changes
            .apply_to(&mut updated, at)
            .map_err(MutationError::Rejected)?;
        if let Some(constraint) = guard.unique_violation(&updated) {
            return Err(RepoError::Duplicate {
                constraint: constraint.to_string(),
            }
            .into());
        }
        guard.users.insert(id, updated.clone());
        Ok(updated)
    }

    async fn apply_relationship(
        &self,
        actor: Uuid,
        target: Uuid,
        op: RelationshipOp,
    ) -> Result<RelationshipPair, MutationError<RelationshipError>> {
        let mut guard = self.inner.write().await;
        let mut actor_doc = guard.users.get(&actor).cloned().ok_or(RepoError::NotFound)?;
        let mut target_doc = guard
            .users
            .get(&target)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        op.apply(&mut actor_doc, &mut target_doc)
            .map_err(MutationError::Rejected)?;

        guard.users.insert(actor, actor_doc.clone());
        guard.users.insert(target, target_doc.clone());
        Ok(RelationshipPair {
            actor: actor_doc,
            target: target_doc,
        })
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn create_post(&self, post: &PostRecord) -> Result<(), RepoError> {
        let mut guard = self.inner.write().await;
        if guard.posts.contains_key(&post.id) {
            return Err(RepoError::Duplicate {
                constraint: "posts_pkey".to_string(),
            });
        }
        guard.sync_approved(post);
        guard.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.inner.read().await.posts.get(&id).cloned())
    }

    async fn find_approved_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.inner.read().await.approved.get(&id).cloned())
    }

    async fn list_posts(&self, filter: PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let guard = self.inner.read().await;
        let mut posts: Vec<PostRecord> = match filter {
            PostListFilter::Approved => guard.approved.values().cloned().collect(),
            PostListFilter::Pending => guard
                .posts
                .values()
                .filter(|post| !post.approved && post.rejection.is_none())
                .cloned()
                .collect(),
            PostListFilter::ByAuthor(author) => guard
                .posts
                .values()
                .filter(|post| post.author_id == author)
                .cloned()
                .collect(),
        };

        match filter {
            PostListFilter::Pending => {
                posts.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then(a.id.cmp(&b.id)))
            }
            PostListFilter::Approved | PostListFilter::ByAuthor(_) => {
                posts.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)))
            }
        }
        Ok(posts)
    }

    async fn apply_post_op(
        &self,
        id: Uuid,
        op: PostOp,
    ) -> Result<PostMutation, MutationError<PostRuleError>> {
        let mut guard = self.inner.write().await;
        let mut post = guard.posts.get(&id).cloned().ok_or(RepoError::NotFound)?;
        let effect = op.apply(&mut post).map_err(MutationError::Rejected)?;

        guard.sync_approved(&post);
        guard.posts.insert(id, post.clone());
        Ok(PostMutation { post, effect })
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut guard = self.inner.write().await;
        let removed = guard.posts.remove(&id);
        guard.approved.remove(&id);
        removed.map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepositories {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), RepoError> {
        let mut guard = self.inner.write().await;
        if guard
            .sessions
            .values()
            .any(|existing| existing.prefix == session.prefix)
        {
            return Err(RepoError::Duplicate {
                constraint: SESSIONS_PREFIX_KEY.to_string(),
            });
        }
        guard.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let guard = self.inner.read().await;
        Ok(guard
            .sessions
            .values()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut guard = self.inner.write().await;
        let session = guard.sessions.get_mut(&id).ok_or(RepoError::NotFound)?;
        session.revoked_at.get_or_insert(at);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut guard = self.inner.write().await;
        let before = guard.sessions.len();
        guard.sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - guard.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::posts::PostContent;

    fn user(email: &str, username: &str) -> UserRecord {
        UserRecord::new(
            email.into(),
            username.into(),
            "Someone".into(),
            None,
            None,
            datetime!(2024-01-01 00:00 UTC),
        )
    }

    #[tokio::test]
    async fn duplicate_username_reports_username_constraint() {
        let repo = MemoryRepositories::new();
        repo.create_user(&user("a@x.io", "taken")).await.unwrap();

        match repo.create_user(&user("b@x.io", "taken")).await {
            Err(RepoError::Duplicate { constraint }) => assert!(constraint.contains("username")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn approved_copy_follows_canonical_post() {
        let repo = MemoryRepositories::new();
        let author = Uuid::new_v4();
        let post = PostRecord::new(
            author,
            Some("hi".into()),
            None,
            datetime!(2024-01-01 00:00 UTC),
        );
        repo.create_post(&post).await.unwrap();
        assert!(repo.find_approved_post(post.id).await.unwrap().is_none());

        let at = datetime!(2024-01-02 00:00 UTC);
        repo.apply_post_op(post.id, PostOp::Approve { at })
            .await
            .unwrap();
        let approved = repo.find_approved_post(post.id).await.unwrap().unwrap();
        assert_eq!(Some(approved), repo.find_post(post.id).await.unwrap());

        let content = PostContent::new(Some("edited".into()), None).unwrap();
        repo.apply_post_op(
            post.id,
            PostOp::Edit {
                actor: author,
                content,
                at,
            },
        )
        .await
        .unwrap();
        assert!(repo.find_approved_post(post.id).await.unwrap().is_none());

        repo.delete_post(post.id).await.unwrap();
        assert!(repo.find_post(post.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_post(post.id).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn pending_lists_oldest_first_and_skips_rejected() {
        let repo = MemoryRepositories::new();
        let author = Uuid::new_v4();
        let older = PostRecord::new(author, Some("1".into()), None, datetime!(2024-01-01 00:00 UTC));
        let newer = PostRecord::new(author, Some("2".into()), None, datetime!(2024-01-02 00:00 UTC));
        let mut rejected =
            PostRecord::new(author, Some("3".into()), None, datetime!(2024-01-03 00:00 UTC));
        rejected.rejection = Some("no".into());
        for post in [&newer, &rejected, &older] {
            repo.create_post(post).await.unwrap();
        }

        let pending = repo.list_posts(PostListFilter::Pending).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);

        let mine = repo
            .list_posts(PostListFilter::ByAuthor(author))
            .await
            .unwrap();
        assert_eq!(mine.first().map(|post| post.id), Some(rejected.id));
    }
}
