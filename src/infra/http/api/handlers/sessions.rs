use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use hearth_api_types::{SessionRequest, SessionResponse};
use tracing::info;

use crate::application::sessions::SessionPrincipal;
use crate::application::users::UserServiceError;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::user_view;
use crate::infra::http::api::state::ApiState;

/// Exchange an identity-provider-verified email for a session token.
pub async fn create_session(
    State(state): State<ApiState>,
    jar: CookieJar,
    Json(body): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.sessions.issue(&body.email).await?;
    let user = match state.users.get_by_email(&issued.record.email).await {
        Ok(user) => Some(user_view(&user)),
        Err(UserServiceError::NotFound) => None,
        Err(err) => return Err(err.into()),
    };

    info!(
        target = "hearth::api::session",
        session_id = %issued.record.id,
        registered = user.is_some(),
        "session issued"
    );

    let jar = jar.add(
        state
            .cookie
            .issue(issued.token.clone(), state.sessions.ttl()),
    );
    let body = SessionResponse {
        token: issued.token,
        expires_at: issued.record.expires_at,
        user,
    };
    Ok((StatusCode::CREATED, jar, Json(body)))
}

pub async fn delete_session(
    State(state): State<ApiState>,
    Extension(principal): Extension<SessionPrincipal>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.revoke(principal.session_id).await?;
    let jar = jar.remove(state.cookie.removal());
    Ok((StatusCode::NO_CONTENT, jar))
}
