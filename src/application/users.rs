use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{MutationError, ProfileChanges, RepoError, UsersRepo};
use crate::application::sessions::{SessionError, normalize_email};
use crate::domain::entities::{EducationEntry, Location, SocialLink, UserRecord, WorkEntry};
use crate::domain::error::DomainError;
use crate::domain::posts::validate_image_url;
use crate::domain::usernames::{
    CooldownError, UsernameAsyncError, UsernameError, default_avatar_url,
    generate_username_async, random_digits, validate_username,
};

/// Upper bound on ids accepted by one batch lookup.
pub const MAX_BATCH_IDS: usize = 200;
const MAX_NAME_CHARS: usize = 80;
const MAX_BIO_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("user not found")]
    NotFound,
    #[error("this email already has a profile")]
    AlreadyRegistered,
    #[error("username `{0}` is taken")]
    UsernameTaken(String),
    #[error("{field} can be changed again after {until}")]
    Cooldown {
        field: &'static str,
        until: OffsetDateTime,
    },
    #[error(transparent)]
    Username(#[from] UsernameError),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<UsernameAsyncError<RepoError>> for UserServiceError {
    fn from(value: UsernameAsyncError<RepoError>) -> Self {
        match value {
            UsernameAsyncError::Username(err) => Self::Username(err),
            UsernameAsyncError::Predicate(err) => Self::Repo(err),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterUserCommand {
    pub name: String,
    pub username: Option<String>,
    pub profile: Option<String>,
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileCommand {
    pub name: Option<String>,
    pub username: Option<String>,
    pub profile: Option<String>,
    pub cover: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub location: Option<Location>,
    pub work: Option<Vec<WorkEntry>>,
    pub education: Option<Vec<EducationEntry>>,
    pub social_links: Option<Vec<SocialLink>>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Create the profile for a session's verified email.
    pub async fn register(
        &self,
        email: &str,
        command: RegisterUserCommand,
    ) -> Result<UserRecord, UserServiceError> {
        let email = normalize_email(email)?;
        let name = validate_name(&command.name)?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(UserServiceError::AlreadyRegistered);
        }

        let username = match command.username.as_deref() {
            Some(requested) => {
                let username = validate_username(requested)?;
                if !self.username_available(&username).await? {
                    return Err(UserServiceError::UsernameTaken(username));
                }
                username
            }
            None => {
                let users = self.users.clone();
                generate_username_async(&name, random_digits, move |candidate| {
                    let users = users.clone();
                    let candidate = candidate.to_string();
                    async move {
                        users
                            .find_user_by_username(&candidate)
                            .await
                            .map(|found| found.is_none())
                    }
                })
                .await?
            }
        };

        let profile = match trimmed(command.profile) {
            Some(url) => {
                validate_image_url(&url)?;
                url
            }
            None => default_avatar_url(&name),
        };
        let cover = trimmed(command.cover);
        if let Some(url) = cover.as_deref() {
            validate_image_url(url)?;
        }

        let user = UserRecord::new(
            email,
            username,
            name,
            Some(profile),
            cover,
            OffsetDateTime::now_utc(),
        );

        let created = self.users.create_user(&user).await;
        match created {
            Ok(()) => {}
            Err(RepoError::Duplicate { constraint }) if constraint.contains("username") => {
                return Err(UserServiceError::UsernameTaken(user.username));
            }
            Err(RepoError::Duplicate { .. }) => return Err(UserServiceError::AlreadyRegistered),
            Err(err) => return Err(err.into()),
        }

        info!(
            target = "hearth::users",
            user_id = %user.id,
            username = %user.username,
            "user registered"
        );

        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserRecord, UserServiceError> {
        self.users
            .find_user(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<UserRecord, UserServiceError> {
        let email = normalize_email(email).map_err(|_| UserServiceError::NotFound)?;
        self.users
            .find_user_by_email(&email)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserRecord, UserServiceError> {
        let username = username.trim().to_ascii_lowercase();
        self.users
            .find_user_by_username(&username)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Users for `ids` in request order, duplicates and unknown ids dropped.
    pub async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>, UserServiceError> {
        if ids.len() > MAX_BATCH_IDS {
            return Err(DomainError::validation(format!(
                "at most {MAX_BATCH_IDS} ids per request"
            ))
            .into());
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = self.users.find_users(&unique).await?;
        found.sort_by_key(|user| unique.iter().position(|id| *id == user.id));
        Ok(found)
    }

    /// `false` for malformed usernames as well as taken ones.
    pub async fn username_available(&self, username: &str) -> Result<bool, UserServiceError> {
        let Ok(username) = validate_username(username) else {
            return Ok(false);
        };
        Ok(self.users.find_user_by_username(&username).await?.is_none())
    }

    pub async fn update_profile(
        &self,
        user: &UserRecord,
        command: UpdateProfileCommand,
    ) -> Result<UserRecord, UserServiceError> {
        let now = OffsetDateTime::now_utc();
        let mut changes = ProfileChanges::default();

        // Cooldowns are enforced by the store against the locked document.
        if let Some(requested) = command.name.as_deref() {
            changes.name = Some(validate_name(requested)?);
        }

        if let Some(requested) = command.username.as_deref() {
            let username = validate_username(requested)?;
            if username != user.username && !self.username_available(&username).await? {
                return Err(UserServiceError::UsernameTaken(username));
            }
            changes.username = Some(username);
        }

        if let Some(url) = trimmed(command.profile) {
            validate_image_url(&url)?;
            changes.profile = Some(url);
        }
        if let Some(url) = trimmed(command.cover) {
            validate_image_url(&url)?;
            changes.cover = Some(url);
        }
        if let Some(bio) = command.bio {
            let bio = bio.trim().to_string();
            if bio.chars().count() > MAX_BIO_CHARS {
                return Err(DomainError::TooLong {
                    field: "bio",
                    max: MAX_BIO_CHARS,
                }
                .into());
            }
            changes.bio = Some(bio);
        }
        if let Some(phone) = command.phone {
            changes.phone = Some(phone.trim().to_string());
        }
        if let Some(website) = trimmed(command.website) {
            url::Url::parse(&website)
                .map_err(|err| DomainError::malformed("website", err))?;
            changes.website = Some(website);
        }
        if let Some(links) = command.social_links.as_ref() {
            for link in links {
                url::Url::parse(&link.url).map_err(|err| {
                    DomainError::malformed("social link", format!("{}: {err}", link.platform))
                })?;
            }
        }
        changes.location = command.location;
        changes.work = command.work;
        changes.education = command.education;
        changes.social_links = command.social_links;

        if changes.is_empty() {
            return Ok(user.clone());
        }

        let updated = self.users.update_profile(user.id, &changes, now).await;
        match updated {
            Ok(updated) => Ok(updated),
            Err(MutationError::Rejected(CooldownError { field, until })) => {
                Err(UserServiceError::Cooldown { field, until })
            }
            Err(MutationError::Repo(RepoError::Duplicate { .. })) => Err(
                UserServiceError::UsernameTaken(changes.username.unwrap_or_default()),
            ),
            Err(MutationError::Repo(RepoError::NotFound)) => Err(UserServiceError::NotFound),
            Err(MutationError::Repo(err)) => Err(err.into()),
        }
    }
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    DomainError::bounded("name", name, MAX_NAME_CHARS)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
