//! A signed-in user's view of Hearth: the HTTP client plus a query cache
//! that mutations patch optimistically.

use std::num::NonZeroUsize;
use std::time::Duration;

use hearth_api_types::{CommentView, LikeResponse, PostView, RelationshipView};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryData, QueryKey};
use crate::client::{ClientError, HearthClient};
use crate::optimistic::run_optimistic_all;
use crate::patches::{self, RelationshipChange};

const TARGET: &str = "hearth_client::session";

pub struct SocialSession {
    client: HearthClient,
    cache: QueryCache<QueryKey, QueryData>,
    max_age: Duration,
}

impl SocialSession {
    pub fn new(client: HearthClient, capacity: NonZeroUsize, max_age: Duration) -> Self {
        Self {
            client,
            cache: QueryCache::new(capacity),
            max_age,
        }
    }

    pub fn client(&self) -> &HearthClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache<QueryKey, QueryData> {
        &self.cache
    }

    /// Id of the signed-in user, known once `MyData` has been loaded.
    pub fn viewer_id(&self) -> Option<Uuid> {
        match self.cache.entry(&QueryKey::MyData)?.value {
            QueryData::MyData(data) => Some(data.user.id),
            _ => None,
        }
    }

    fn require_viewer(&self) -> Result<Uuid, ClientError> {
        self.viewer_id().ok_or(ClientError::MissingProfile)
    }

    /// Cached data when fresh, otherwise a refetch.
    pub async fn query(&self, key: QueryKey) -> Result<QueryData, ClientError> {
        if let Some(value) = self.cache.get_fresh(&key, self.max_age) {
            return Ok(value);
        }
        self.refetch(key).await
    }

    /// Load `key` from the server and replace the cached value.
    pub async fn refetch(&self, key: QueryKey) -> Result<QueryData, ClientError> {
        let data = match key {
            QueryKey::Feed => QueryData::Posts(self.client.feed().await?),
            QueryKey::MyData => QueryData::MyData(self.client.me().await?),
            QueryKey::PendingPosts => QueryData::Posts(self.client.pending_posts().await?),
            QueryKey::User(id) => QueryData::User(self.client.user(id).await?),
            QueryKey::Relationship(id) => {
                QueryData::Relationship(self.client.relationship(id).await?)
            }
        };
        self.cache.set(key, data.clone());
        debug!(target = TARGET, key = ?key, "query refetched");
        Ok(data)
    }

    /// Refetch every stale entry. Failures leave the entry stale.
    pub async fn reconcile(&self) -> usize {
        let mut refreshed = 0;
        for key in self.cache.stale_keys() {
            match self.refetch(key).await {
                Ok(_) => refreshed += 1,
                Err(err) => {
                    warn!(target = TARGET, key = ?key, error = %err, "refetch failed");
                }
            }
        }
        refreshed
    }

    pub async fn toggle_like(&self, post_id: Uuid) -> Result<LikeResponse, ClientError> {
        let viewer = self.require_viewer()?;
        run_optimistic_all(
            &self.cache,
            QueryKey::POST_LISTS,
            |data: &mut QueryData| patches::toggle_like(data, post_id, viewer),
            self.client.toggle_like(post_id),
        )
        .await
    }

    pub async fn add_comment(&self, post_id: Uuid, text: &str) -> Result<CommentView, ClientError> {
        let viewer = self.require_viewer()?;
        let placeholder = patches::pending_comment(viewer, text);
        let stored = run_optimistic_all(
            &self.cache,
            QueryKey::POST_LISTS,
            |data: &mut QueryData| patches::append_comment(data, post_id, &placeholder),
            self.client.add_comment(post_id, text),
        )
        .await?;

        for key in QueryKey::POST_LISTS {
            self.cache.patch(&key, |data| {
                patches::replace_comment(data, post_id, placeholder.id, &stored);
            });
        }
        Ok(stored)
    }

    pub async fn edit_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> Result<CommentView, ClientError> {
        let at = OffsetDateTime::now_utc();
        run_optimistic_all(
            &self.cache,
            QueryKey::POST_LISTS,
            |data: &mut QueryData| patches::edit_comment(data, post_id, comment_id, text, at),
            self.client.edit_comment(post_id, comment_id, text),
        )
        .await
    }

    pub async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> Result<(), ClientError> {
        run_optimistic_all(
            &self.cache,
            QueryKey::POST_LISTS,
            |data: &mut QueryData| patches::remove_comment(data, post_id, comment_id),
            self.client.delete_comment(post_id, comment_id),
        )
        .await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<(), ClientError> {
        run_optimistic_all(
            &self.cache,
            QueryKey::POST_LISTS,
            |data: &mut QueryData| patches::remove_post(data, post_id),
            self.client.delete_post(post_id),
        )
        .await
    }

    /// Approval takes the post out of the pending queue. The feed is only
    /// marked stale since an approval adds to it.
    pub async fn approve_post(&self, post_id: Uuid) -> Result<PostView, ClientError> {
        self.moderate(
            post_id,
            [QueryKey::PendingPosts],
            self.client.approve_post(post_id),
        )
        .await
    }

    /// Rejection also takes a published post off the feed.
    pub async fn reject_post(&self, post_id: Uuid) -> Result<PostView, ClientError> {
        self.moderate(
            post_id,
            [QueryKey::PendingPosts, QueryKey::Feed],
            self.client.reject_post(post_id),
        )
        .await
    }

    async fn moderate(
        &self,
        post_id: Uuid,
        removed_from: impl IntoIterator<Item = QueryKey>,
        request: impl Future<Output = Result<PostView, ClientError>>,
    ) -> Result<PostView, ClientError> {
        let decided = run_optimistic_all(
            &self.cache,
            removed_from,
            |data: &mut QueryData| patches::remove_post(data, post_id),
            request,
        )
        .await?;

        // A moderator's own post also sits in `MyData`.
        self.cache.patch(&QueryKey::MyData, |data| {
            patches::set_moderation(data, &decided);
        });
        self.cache.mark_stale(&QueryKey::MyData);
        self.cache.mark_stale(&QueryKey::Feed);
        Ok(decided)
    }

    pub async fn follow(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship(target, RelationshipChange::Follow, self.client.follow(target))
            .await
    }

    pub async fn unfollow(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship(
            target,
            RelationshipChange::Unfollow,
            self.client.unfollow(target),
        )
        .await
    }

    pub async fn send_friend_request(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship(
            target,
            RelationshipChange::SendRequest,
            self.client.send_friend_request(target),
        )
        .await
    }

    pub async fn cancel_friend_request(
        &self,
        target: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship(
            target,
            RelationshipChange::CancelRequest,
            self.client.cancel_friend_request(target),
        )
        .await
    }

    pub async fn accept_friend_request(
        &self,
        requester: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship(
            requester,
            RelationshipChange::AcceptRequest,
            self.client.accept_friend_request(requester),
        )
        .await
    }

    pub async fn reject_friend_request(
        &self,
        requester: Uuid,
    ) -> Result<RelationshipView, ClientError> {
        self.relationship(
            requester,
            RelationshipChange::RejectRequest,
            self.client.reject_friend_request(requester),
        )
        .await
    }

    pub async fn unfriend(&self, target: Uuid) -> Result<RelationshipView, ClientError> {
        self.relationship(
            target,
            RelationshipChange::Unfriend,
            self.client.unfriend(target),
        )
        .await
    }

    async fn relationship(
        &self,
        target: Uuid,
        change: RelationshipChange,
        request: impl Future<Output = Result<RelationshipView, ClientError>>,
    ) -> Result<RelationshipView, ClientError> {
        let viewer = self.require_viewer()?;
        let keys = [
            QueryKey::MyData,
            QueryKey::User(viewer),
            QueryKey::User(target),
            QueryKey::Relationship(target),
        ];
        run_optimistic_all(
            &self.cache,
            keys,
            |data: &mut QueryData| patches::apply_relationship(data, viewer, target, change),
            request,
        )
        .await
    }
}
