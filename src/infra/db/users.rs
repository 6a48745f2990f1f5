use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    MutationError, ProfileChanges, RelationshipPair, RepoError, UsersRepo,
};
use crate::domain::entities::{EducationEntry, Location, SocialLink, UserRecord, WorkEntry};
use crate::domain::relationships::{RelationshipError, RelationshipOp};
use crate::domain::types::UserRole;
use crate::domain::usernames::CooldownError;

use super::{PostgresRepositories, TransactionTimer, map_sqlx_error};

const USER_COLUMNS: &str = "id, email, username, name, role, profile, cover, bio, phone, \
    website, location, work, education, social_links, friends, following, followers, \
    pending_requests, sent_requests, last_name_change, last_username_change, created_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    name: String,
    role: UserRole,
    profile: Option<String>,
    cover: Option<String>,
    bio: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    location: Json<Location>,
    work: Json<Vec<WorkEntry>>,
    education: Json<Vec<EducationEntry>>,
    social_links: Json<Vec<SocialLink>>,
    friends: Vec<Uuid>,
    following: Vec<Uuid>,
    followers: Vec<Uuid>,
    pending_requests: Vec<Uuid>,
    sent_requests: Vec<Uuid>,
    last_name_change: Option<OffsetDateTime>,
    last_username_change: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            name: row.name,
            role: row.role,
            profile: row.profile,
            cover: row.cover,
            bio: row.bio,
            phone: row.phone,
            website: row.website,
            location: row.location.0,
            work: row.work.0,
            education: row.education.0,
            social_links: row.social_links.0,
            friends: row.friends,
            following: row.following,
            followers: row.followers,
            pending_requests: row.pending_requests,
            sent_requests: row.sent_requests,
            last_name_change: row.last_name_change,
            last_username_change: row.last_username_change,
            created_at: row.created_at,
        }
    }
}

impl PostgresRepositories {
    async fn find_user_where(
        &self,
        condition: &str,
        value: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {condition} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }
}

async fn lock_users(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> Result<Vec<UserRecord>, RepoError> {
    // Lock in id order so concurrent transitions on the same pair cannot deadlock.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE");
    let rows = sqlx::query_as::<_, UserRow>(&sql)
        .bind(ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(rows.into_iter().map(UserRecord::from).collect())
}

async fn store_relationships(
    tx: &mut Transaction<'_, Postgres>,
    user: &UserRecord,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE users
        SET friends = $2, following = $3, followers = $4,
            pending_requests = $5, sent_requests = $6
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.friends)
    .bind(&user.following)
    .bind(&user.followers)
    .bind(&user.pending_requests)
    .bind(&user.sent_requests)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, user: &UserRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, name, role, profile, cover, bio, phone, website,
                location, work, education, social_links, friends, following, followers,
                pending_requests, sent_requests, last_name_change, last_username_change,
                created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21,
                $22
            )
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.profile)
        .bind(&user.cover)
        .bind(&user.bio)
        .bind(&user.phone)
        .bind(&user.website)
        .bind(Json(&user.location))
        .bind(Json(&user.work))
        .bind(Json(&user.education))
        .bind(Json(&user.social_links))
        .bind(&user.friends)
        .bind(&user.following)
        .bind(&user.followers)
        .bind(&user.pending_requests)
        .bind(&user.sent_requests)
        .bind(user.last_name_change)
        .bind(user.last_username_change)
        .bind(user.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        self.find_user_where("email", email).await
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        self.find_user_where("username", username).await
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        at: OffsetDateTime,
    ) -> Result<UserRecord, MutationError<CooldownError>> {
        let _timer = TransactionTimer::start("update_profile");
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut user = lock_users(&mut tx, &[id])
            .await?
            .pop()
            .ok_or(RepoError::NotFound)?;
        changes
            .apply_to(&mut user, at)
            .map_err(MutationError::Rejected)?;

        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, username = $3, profile = $4, cover = $5, bio = $6, phone = $7,
                website = $8, location = $9, work = $10, education = $11,
                social_links = $12, last_name_change = $13, last_username_change = $14
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.profile)
        .bind(&user.cover)
        .bind(&user.bio)
        .bind(&user.phone)
        .bind(&user.website)
        .bind(Json(&user.location))
        .bind(Json(&user.work))
        .bind(Json(&user.education))
        .bind(Json(&user.social_links))
        .bind(user.last_name_change)
        .bind(user.last_username_change)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(user)
    }

    async fn apply_relationship(
        &self,
        actor: Uuid,
        target: Uuid,
        op: RelationshipOp,
    ) -> Result<RelationshipPair, MutationError<RelationshipError>> {
        let _timer = TransactionTimer::start(op.as_str());
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let locked = lock_users(&mut tx, &[actor, target]).await?;

        let mut actor_doc = locked
            .iter()
            .find(|user| user.id == actor)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        let mut target_doc = locked
            .iter()
            .find(|user| user.id == target)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        // Dropping `tx` on a refused transition rolls back and releases the locks.
        op.apply(&mut actor_doc, &mut target_doc)
            .map_err(MutationError::Rejected)?;

        store_relationships(&mut tx, &actor_doc).await?;
        store_relationships(&mut tx, &target_doc).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(RelationshipPair {
            actor: actor_doc,
            target: target_doc,
        })
    }
}
