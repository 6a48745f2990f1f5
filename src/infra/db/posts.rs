use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    MutationError, PostListFilter, PostMutation, PostsRepo, RepoError,
};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::posts::{PostOp, PostRuleError};
use crate::domain::types::PostCollection;

use super::{PostgresRepositories, TransactionTimer, map_sqlx_error};

const POST_COLUMNS: &str =
    "id, author_id, caption, image, liked_by, comments, approved, rejection, posted_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    caption: Option<String>,
    image: Option<String>,
    liked_by: Vec<Uuid>,
    comments: Json<Vec<CommentRecord>>,
    approved: bool,
    rejection: Option<String>,
    posted_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            caption: row.caption,
            image: row.image,
            liked_by: row.liked_by,
            comments: row.comments.0,
            approved: row.approved,
            rejection: row.rejection,
            posted_at: row.posted_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    async fn find_in(
        &self,
        collection: PostCollection,
        id: Uuid,
    ) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM {} WHERE id = $1",
            collection.table()
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }
}

/// Write `post` into `collection`, inserting or overwriting by id.
async fn upsert_post(
    tx: &mut Transaction<'_, Postgres>,
    collection: PostCollection,
    post: &PostRecord,
) -> Result<(), RepoError> {
    let sql = format!(
        r#"
        INSERT INTO {table} ({POST_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE
        SET caption = EXCLUDED.caption, image = EXCLUDED.image,
            liked_by = EXCLUDED.liked_by, comments = EXCLUDED.comments,
            approved = EXCLUDED.approved, rejection = EXCLUDED.rejection,
            updated_at = EXCLUDED.updated_at
        "#,
        table = collection.table()
    );
    sqlx::query(&sql)
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.caption)
        .bind(&post.image)
        .bind(&post.liked_by)
        .bind(Json(&post.comments))
        .bind(post.approved)
        .bind(&post.rejection)
        .bind(post.posted_at)
        .bind(post.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

/// Make the approved collection agree with the canonical copy.
async fn sync_approved(
    tx: &mut Transaction<'_, Postgres>,
    post: &PostRecord,
) -> Result<(), RepoError> {
    if post.approved {
        upsert_post(tx, PostCollection::Approved, post).await
    } else {
        sqlx::query("DELETE FROM approved_posts WHERE id = $1")
            .bind(post.id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn create_post(&self, post: &PostRecord) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let sql = format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&sql)
            .bind(post.id)
            .bind(post.author_id)
            .bind(&post.caption)
            .bind(&post.image)
            .bind(&post.liked_by)
            .bind(Json(&post.comments))
            .bind(post.approved)
            .bind(&post.rejection)
            .bind(post.posted_at)
            .bind(post.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sync_approved(&mut tx, post).await?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.find_in(PostCollection::All, id).await
    }

    async fn find_approved_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.find_in(PostCollection::Approved, id).await
    }

    async fn list_posts(&self, filter: PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let query = match filter {
            PostListFilter::Approved => sqlx::query_as::<_, PostRow>(
                "SELECT id, author_id, caption, image, liked_by, comments, approved, rejection, \
                 posted_at, updated_at FROM approved_posts ORDER BY posted_at DESC, id DESC",
            ),
            PostListFilter::Pending => sqlx::query_as::<_, PostRow>(
                "SELECT id, author_id, caption, image, liked_by, comments, approved, rejection, \
                 posted_at, updated_at FROM posts WHERE NOT approved AND rejection IS NULL \
                 ORDER BY posted_at ASC, id ASC",
            ),
            PostListFilter::ByAuthor(author) => sqlx::query_as::<_, PostRow>(
                "SELECT id, author_id, caption, image, liked_by, comments, approved, rejection, \
                 posted_at, updated_at FROM posts WHERE author_id = $1 \
                 ORDER BY posted_at DESC, id DESC",
            )
            .bind(author),
        };

        let rows = query.fetch_all(self.pool()).await.map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn apply_post_op(
        &self,
        id: Uuid,
        op: PostOp,
    ) -> Result<PostMutation, MutationError<PostRuleError>> {
        let _timer = TransactionTimer::start(op.as_str());
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE");
        let mut post = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .map(PostRecord::from)
            .ok_or(RepoError::NotFound)?;

        let effect = op.apply(&mut post).map_err(MutationError::Rejected)?;

        upsert_post(&mut tx, PostCollection::All, &post).await?;
        sync_approved(&mut tx, &post).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PostMutation { post, effect })
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM approved_posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(map_sqlx_error)
    }
}
