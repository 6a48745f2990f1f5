use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use hearth::application::repos::{
    MutationError, PostListFilter, PostsRepo, RepoError, UsersRepo,
};
use hearth::domain::entities::{CommentRecord, PostRecord, UserRecord};
use hearth::domain::posts::{PostContent, PostEffect, PostOp, PostRuleError};
use hearth::domain::relationships::{RelationshipError, RelationshipOp};
use hearth::domain::types::ModerationState;
use hearth::infra::db::PostgresRepositories;

fn at(offset: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000 + offset).expect("valid timestamp")
}

async fn user(repos: &PostgresRepositories, name: &str) -> UserRecord {
    let user = UserRecord::new(
        format!("{name}@example.com"),
        name.to_string(),
        name.to_string(),
        None,
        None,
        at(0),
    );
    repos.create_user(&user).await.expect("create user");
    user
}

async fn pending_post(repos: &PostgresRepositories, author: &UserRecord) -> PostRecord {
    let post = PostRecord::new(author.id, Some("first light".into()), None, at(1));
    repos.create_post(&post).await.expect("create post");
    post
}

async fn approved_post(repos: &PostgresRepositories, author: &UserRecord) -> PostRecord {
    let post = pending_post(repos, author).await;
    repos
        .apply_post_op(post.id, PostOp::Approve { at: at(2) })
        .await
        .expect("approve")
        .post
}

async fn approved_row_count(pool: &PgPool, id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM approved_posts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("count approved rows")
}

#[sqlx::test(migrations = "./migrations")]
async fn approving_copies_the_post_into_the_feed_table(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ada = user(&repos, "ada").await;
    let post = pending_post(&repos, &ada).await;
    assert_eq!(approved_row_count(&pool, post.id).await, 0);

    let approved = repos
        .apply_post_op(post.id, PostOp::Approve { at: at(2) })
        .await
        .expect("approve")
        .post;
    assert_eq!(approved.moderation_state(), ModerationState::Approved);
    assert_eq!(approved_row_count(&pool, post.id).await, 1);

    let feed = repos
        .list_posts(PostListFilter::Approved)
        .await
        .expect("feed");
    let ids: Vec<Uuid> = feed.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![post.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn editing_an_approved_post_withdraws_the_feed_copy(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ada = user(&repos, "ada").await;
    let post = approved_post(&repos, &ada).await;

    let content = PostContent::new(Some("second light".into()), None).expect("content");
    let edited = repos
        .apply_post_op(
            post.id,
            PostOp::Edit {
                actor: ada.id,
                content,
                at: at(3),
            },
        )
        .await
        .expect("edit")
        .post;

    assert_eq!(edited.moderation_state(), ModerationState::Pending);
    assert_eq!(approved_row_count(&pool, post.id).await, 0);
    let stored = repos.find_post(post.id).await.expect("find").expect("post row");
    assert_eq!(stored.caption.as_deref(), Some("second light"));
    assert!(!stored.approved);
}

#[sqlx::test(migrations = "./migrations")]
async fn rejecting_a_published_post_drops_the_feed_copy(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ada = user(&repos, "ada").await;
    let post = approved_post(&repos, &ada).await;

    let rejected = repos
        .apply_post_op(post.id, PostOp::Reject { at: at(3) })
        .await
        .expect("reject")
        .post;

    assert_eq!(rejected.moderation_state(), ModerationState::Rejected);
    assert_eq!(approved_row_count(&pool, post.id).await, 0);
    assert!(repos.find_approved_post(post.id).await.expect("find").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn likes_and_comments_land_in_both_tables(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "ada").await;
    let bob = user(&repos, "bob").await;
    let post = approved_post(&repos, &ada).await;

    let liked = repos
        .apply_post_op(
            post.id,
            PostOp::ToggleLike {
                user_id: bob.id,
                moderator: false,
            },
        )
        .await
        .expect("like");
    assert!(matches!(liked.effect, PostEffect::Like(outcome) if outcome.liked));

    let comment = CommentRecord {
        id: Uuid::new_v4(),
        author_id: bob.id,
        text: "lovely".into(),
        commented_at: at(4),
        edited_at: None,
    };
    repos
        .apply_post_op(
            post.id,
            PostOp::AddComment {
                comment: comment.clone(),
                moderator: false,
            },
        )
        .await
        .expect("comment");

    let canonical = repos.find_post(post.id).await.expect("find").expect("post row");
    let published = repos
        .find_approved_post(post.id)
        .await
        .expect("find approved")
        .expect("approved row");
    for copy in [&canonical, &published] {
        assert_eq!(copy.liked_by, vec![bob.id]);
        assert_eq!(copy.comments, vec![comment.clone()]);
    }

    repos
        .apply_post_op(
            post.id,
            PostOp::DeleteComment {
                comment_id: comment.id,
                actor: bob.id,
                moderator: false,
            },
        )
        .await
        .expect("delete comment");
    let published = repos
        .find_approved_post(post.id)
        .await
        .expect("find approved")
        .expect("approved row");
    assert!(published.comments.is_empty());
    assert_eq!(published.liked_by, vec![bob.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_post_clears_both_tables(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let ada = user(&repos, "ada").await;
    let post = approved_post(&repos, &ada).await;

    repos.delete_post(post.id).await.expect("delete");

    assert!(repos.find_post(post.id).await.expect("find").is_none());
    assert_eq!(approved_row_count(&pool, post.id).await, 0);
    assert!(matches!(
        repos.delete_post(post.id).await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn refused_post_ops_leave_both_rows_untouched(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "ada").await;
    let bob = user(&repos, "bob").await;
    let post = approved_post(&repos, &ada).await;

    let result = repos
        .apply_post_op(post.id, PostOp::Approve { at: at(9) })
        .await;
    assert!(matches!(
        result,
        Err(MutationError::Rejected(PostRuleError::AlreadyApproved))
    ));

    let content = PostContent::new(Some("hijacked".into()), None).expect("content");
    let result = repos
        .apply_post_op(
            post.id,
            PostOp::Edit {
                actor: bob.id,
                content,
                at: at(9),
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(MutationError::Rejected(PostRuleError::NotAuthor))
    ));

    let canonical = repos.find_post(post.id).await.expect("find").expect("post row");
    let published = repos
        .find_approved_post(post.id)
        .await
        .expect("find approved")
        .expect("approved row");
    for copy in [&canonical, &published] {
        assert_eq!(copy.caption.as_deref(), Some("first light"));
        assert!(copy.approved);
        assert_eq!(copy.updated_at, at(2));
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn accepting_a_request_befriends_both_rows(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "ada").await;
    let bob = user(&repos, "bob").await;

    repos
        .apply_relationship(bob.id, ada.id, RelationshipOp::SendRequest)
        .await
        .expect("send request");
    let pair = repos
        .apply_relationship(ada.id, bob.id, RelationshipOp::AcceptRequest)
        .await
        .expect("accept request");
    assert_eq!(pair.actor.friends, vec![bob.id]);
    assert_eq!(pair.target.friends, vec![ada.id]);

    let ada = repos.find_user(ada.id).await.expect("find").expect("ada");
    let bob = repos.find_user(bob.id).await.expect("find").expect("bob");
    assert_eq!(ada.friends, vec![bob.id]);
    assert_eq!(bob.friends, vec![ada.id]);
    assert!(ada.pending_requests.is_empty());
    assert!(bob.sent_requests.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn refused_relationship_ops_leave_both_rows_untouched(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let ada = user(&repos, "ada").await;
    let bob = user(&repos, "bob").await;
    repos
        .apply_relationship(bob.id, ada.id, RelationshipOp::SendRequest)
        .await
        .expect("send request");

    // the request came from bob, so there is nothing for bob to accept
    let result = repos
        .apply_relationship(bob.id, ada.id, RelationshipOp::AcceptRequest)
        .await;
    assert!(matches!(
        result,
        Err(MutationError::Rejected(RelationshipError::NoPendingRequest))
    ));

    let ada = repos.find_user(ada.id).await.expect("find").expect("ada");
    let bob = repos.find_user(bob.id).await.expect("find").expect("bob");
    assert!(ada.friends.is_empty() && bob.friends.is_empty());
    assert_eq!(ada.pending_requests, vec![bob.id]);
    assert_eq!(bob.sent_requests, vec![ada.id]);
}
