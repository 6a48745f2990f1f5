//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{ModerationState, UserRole};

pub use hearth_api_types::{EducationEntry, Location, SocialLink, WorkEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub profile: Option<String>,
    pub cover: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub location: Location,
    pub work: Vec<WorkEntry>,
    pub education: Vec<EducationEntry>,
    pub social_links: Vec<SocialLink>,
    pub friends: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub followers: Vec<Uuid>,
    pub pending_requests: Vec<Uuid>,
    pub sent_requests: Vec<Uuid>,
    pub last_name_change: Option<OffsetDateTime>,
    pub last_username_change: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    /// A fresh account with empty relationship arrays.
    pub fn new(
        email: String,
        username: String,
        name: String,
        profile: Option<String>,
        cover: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            name,
            role: UserRole::User,
            profile,
            cover,
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
            last_name_change: None,
            last_username_change: None,
            created_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Comment embedded in a post document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub commented_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub edited_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub caption: Option<String>,
    pub image: Option<String>,
    pub liked_by: Vec<Uuid>,
    pub comments: Vec<CommentRecord>,
    pub approved: bool,
    /// Set when a moderator rejected the post; cleared when the author edits it.
    pub rejection: Option<String>,
    pub posted_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl PostRecord {
    pub fn new(
        author_id: Uuid,
        caption: Option<String>,
        image: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            caption,
            image,
            liked_by: Vec::new(),
            comments: Vec::new(),
            approved: false,
            rejection: None,
            posted_at: now,
            updated_at: now,
        }
    }

    pub fn moderation_state(&self) -> ModerationState {
        if self.approved {
            ModerationState::Approved
        } else if self.rejection.is_some() {
            ModerationState::Rejected
        } else {
            ModerationState::Pending
        }
    }
}
