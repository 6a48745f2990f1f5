use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hearth_api_types::{
    RegisterUserRequest, UpdateProfileRequest, UserView, UsernameAvailability, UsersByIdsRequest,
};
use uuid::Uuid;

use crate::application::sessions::SessionPrincipal;
use crate::application::users::{RegisterUserCommand, UpdateProfileCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{my_data, user_view};
use crate::infra::http::api::state::ApiState;

use super::current_user;

/// Create the profile for the session's email.
pub async fn register_user(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = RegisterUserCommand {
        name: body.name,
        username: body.username,
        profile: body.profile,
        cover: body.cover,
    };
    let user = state.users.register(&principal.email, command).await?;
    Ok((StatusCode::CREATED, Json(user_view(&user))))
}

pub async fn get_user(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get(id).await?;
    Ok(Json(user_view(&user)))
}

pub async fn get_user_by_email(
    State(state): State<ApiState>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get_by_email(&email).await?;
    Ok(Json(user_view(&user)))
}

pub async fn get_user_by_username(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get_by_username(&username).await?;
    Ok(Json(user_view(&user)))
}

pub async fn get_users_batch(
    State(state): State<ApiState>,
    Extension(_principal): Extension<SessionPrincipal>,
    Json(body): Json<UsersByIdsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.get_many(&body.user_ids).await?;
    let views: Vec<UserView> = users.iter().map(user_view).collect();
    Ok(Json(views))
}

pub async fn username_availability(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let available = state.users.username_available(&username).await?;
    Ok(Json(UsernameAvailability {
        username,
        available,
    }))
}

/// The caller's profile plus every post they wrote, in any moderation state.
pub async fn get_me(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let posts = state.posts.by_author(&user).await?;
    Ok(Json(my_data(&user, &posts)))
}

pub async fn update_me(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &principal).await?;
    let command = UpdateProfileCommand {
        name: body.name,
        username: body.username,
        profile: body.profile,
        cover: body.cover,
        bio: body.bio,
        phone: body.phone,
        website: body.website,
        location: body.location,
        work: body.work,
        education: body.education,
        social_links: body.social_links,
    };
    let updated = state.users.update_profile(&user, command).await?;
    Ok(Json(user_view(&updated)))
}
