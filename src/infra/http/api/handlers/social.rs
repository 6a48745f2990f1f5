use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use hearth_api_types::RelationshipView;
use uuid::Uuid;

use crate::application::repos::RelationshipPair;
use crate::application::sessions::SessionPrincipal;
use crate::application::social::Relationship;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::relationship_view;
use crate::infra::http::api::state::ApiState;

use super::current_user;

/// Mutations answer with the caller's updated view of `target`.
fn caller_view(pair: &RelationshipPair, target: Uuid) -> Json<RelationshipView> {
    Json(relationship_view(Relationship::between(&pair.actor, target)))
}

pub async fn send_friend_request(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.send_request(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn cancel_friend_request(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.cancel_request(&user, target).await?;
    Ok(caller_view(&pair, target))
}

/// `target` is the user who sent the request.
pub async fn accept_friend_request(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.accept_request(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn reject_friend_request(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.reject_request(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn unfriend(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.unfriend(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn follow(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.follow(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn unfollow(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let pair = state.social.unfollow(&user, target).await?;
    Ok(caller_view(&pair, target))
}

pub async fn relationship(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Path(target): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let relationship = state.social.relationship(&user, target).await?;
    Ok(Json(relationship_view(relationship)))
}
