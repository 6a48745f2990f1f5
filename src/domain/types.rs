//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

pub use hearth_api_types::{EducationKind, ModerationState, RelationshipState, UserRole};

/// Guideline notice stored on a post when a moderator rejects it.
pub const REJECTION_MESSAGE: &str = "Your post could not be approved. Your post falls outside our guidelines. You can update the post if you wish. We will review your post again if you update it.";

/// The two post collections. Every post lives in `All`; approved posts are
/// also copied into `Approved`, which backs the public feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCollection {
    All,
    Approved,
}

impl PostCollection {
    pub fn table(self) -> &'static str {
        match self {
            Self::All => "posts",
            Self::Approved => "approved_posts",
        }
    }
}
