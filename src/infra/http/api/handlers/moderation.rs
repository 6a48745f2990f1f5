use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::sessions::SessionPrincipal;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{joined_post_views, post_view};
use crate::infra::http::api::state::ApiState;

use super::current_user;

/// Posts awaiting review, oldest first.
pub async fn pending_posts(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
) -> Result<impl IntoResponse, ApiError> {
    let moderator = current_user(&state, &principal).await?;
    let posts = state.posts.pending(&moderator).await?;
    Ok(Json(joined_post_views(&posts)))
}

pub async fn approve_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let moderator = current_user(&state, &principal).await?;
    let post = state.posts.approve(&moderator, id).await?;
    Ok(Json(post_view(&post, None)))
}

pub async fn reject_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let moderator = current_user(&state, &principal).await?;
    let post = state.posts.reject(&moderator, id).await?;
    Ok(Json(post_view(&post, None)))
}
