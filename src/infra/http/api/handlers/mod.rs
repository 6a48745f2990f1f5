//! API handlers grouped by resource.
//!
//! Each handler authenticates (via the auth layer), resolves the acting
//! user, calls one service operation and renders the wire type.

mod health;
mod moderation;
mod posts;
mod sessions;
mod social;
mod users;

pub use health::*;
pub use moderation::*;
pub use posts::*;
pub use sessions::*;
pub use social::*;
pub use users::*;

use crate::application::sessions::SessionPrincipal;
use crate::application::users::UserServiceError;
use crate::domain::entities::UserRecord;

use super::error::ApiError;
use super::state::ApiState;

/// The profile owned by the session's email.
async fn current_user(
    state: &ApiState,
    principal: &SessionPrincipal,
) -> Result<UserRecord, ApiError> {
    match state.users.get_by_email(&principal.email).await {
        Ok(user) => Ok(user),
        Err(UserServiceError::NotFound) => Err(ApiError::profile_required()),
        Err(err) => Err(err.into()),
    }
}
