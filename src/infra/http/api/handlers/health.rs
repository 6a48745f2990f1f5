use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hearth_api_types::HealthResponse;

use crate::infra::http::api::error::{ApiError, codes};
use crate::infra::http::api::state::ApiState;

pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    state.health.ping().await.map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            "Store unavailable",
            Some(err.to_string()),
        )
    })?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
