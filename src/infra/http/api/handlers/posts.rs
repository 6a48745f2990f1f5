use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hearth_api_types::{CommentRequest, LikeResponse, PostContentRequest};
use uuid::Uuid;

use crate::application::sessions::SessionPrincipal;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{comment_view, joined_post_views, post_view};
use crate::infra::http::api::state::ApiState;

use super::current_user;

/// Approved posts, newest first.
pub async fn feed(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let posts = state.posts.feed().await?;
    Ok(Json(joined_post_views(&posts)))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Json(body): Json<PostContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let post = state.posts.create(&user, body.caption, body.image).await?;
    Ok((StatusCode::CREATED, Json(post_view(&post, Some(&user)))))
}

pub async fn edit_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<PostContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let post = state
        .posts
        .edit(&user, id, body.caption, body.image)
        .await?;
    Ok(Json(post_view(&post, Some(&user))))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    state.posts.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let outcome = state.posts.toggle_like(&user, id).await?;
    Ok(Json(LikeResponse {
        liked: outcome.liked,
        like_count: outcome.like_count,
    }))
}

pub async fn add_comment(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let comment = state.posts.add_comment(&user, id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment_view(&comment))))
}

pub async fn edit_comment(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let comment = state
        .posts
        .edit_comment(&user, id, comment_id, &body.text)
        .await?;
    Ok(Json(comment_view(&comment)))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    state.posts.delete_comment(&user, id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
