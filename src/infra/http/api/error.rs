use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearth_api_types::{ApiErrorBody, ApiErrorDetail};
use tracing::error;

use crate::application::error::ErrorReport;
use crate::application::posts::PostServiceError;
use crate::application::repos::RepoError;
use crate::application::sessions::{AuthError, SessionError};
use crate::application::social::SocialServiceError;
use crate::application::users::UserServiceError;
use crate::domain::posts::PostRuleError;
use crate::domain::relationships::RelationshipError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const EXPIRED: &str = "expired";
    pub const REVOKED: &str = "revoked";
    pub const FORBIDDEN: &str = "forbidden";
    pub const PROFILE_REQUIRED: &str = "profile_required";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const COOLDOWN: &str = "cooldown";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const UNAVAILABLE: &str = "unavailable";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn invalid_input(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(hint.into()),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Sign in required",
            None,
        )
    }

    pub fn forbidden(message: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message, None)
    }

    pub fn profile_required() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::PROFILE_REQUIRED,
            "Create a profile before using this endpoint",
            Some("POST /api/v1/users".to_string()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn conflict(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::CONFLICT, codes::CONFLICT, message, hint)
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: codes::RATE_LIMITED.to_string(),
                message: "Rate limit exceeded".to_string(),
                hint: Some(format!("Retry after {retry_after} seconds")),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::api::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::invalid_input(message),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => {
            error!(target = "hearth::api::error", detail = %message, "persistence failure");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                None,
            )
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Missing | AuthError::Invalid => ApiError::unauthorized(),
            AuthError::Expired => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::EXPIRED,
                "Session expired",
                None,
            ),
            AuthError::Revoked => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::REVOKED,
                "Session revoked",
                None,
            ),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::InvalidEmail(_) => ApiError::invalid_input(value.to_string()),
            SessionError::Repo(err) => repo_to_api(err),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(value: UserServiceError) -> Self {
        match value {
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::AlreadyRegistered => {
                ApiError::conflict("Profile already exists", Some(value.to_string()))
            }
            UserServiceError::UsernameTaken(_) => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Username is taken",
                Some(value.to_string()),
            ),
            UserServiceError::Cooldown { .. } => ApiError::new(
                StatusCode::CONFLICT,
                codes::COOLDOWN,
                "Change not allowed yet",
                Some(value.to_string()),
            ),
            UserServiceError::Username(_) | UserServiceError::Validation(_) => {
                ApiError::invalid_input(value.to_string())
            }
            UserServiceError::Session(err) => err.into(),
            UserServiceError::Repo(err) => repo_to_api(err),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(value: PostServiceError) -> Self {
        match value {
            PostServiceError::NotFound => ApiError::not_found("Post not found"),
            PostServiceError::Forbidden => ApiError::forbidden("Moderator role required"),
            PostServiceError::Rule(rule) => match rule {
                PostRuleError::NotAuthor => ApiError::forbidden("Only the author may do that"),
                PostRuleError::NotCommentAuthor => {
                    ApiError::forbidden("Only the comment author may do that")
                }
                PostRuleError::CommentNotFound => ApiError::not_found("Comment not found"),
                PostRuleError::NotVisible => ApiError::not_found("Post not found"),
                PostRuleError::AlreadyApproved => {
                    ApiError::conflict("Post is already approved", None)
                }
            },
            PostServiceError::Validation(err) => ApiError::invalid_input(err.to_string()),
            PostServiceError::Repo(err) => repo_to_api(err),
        }
    }
}

impl From<SocialServiceError> for ApiError {
    fn from(value: SocialServiceError) -> Self {
        match value {
            SocialServiceError::NotFound => ApiError::not_found("User not found"),
            SocialServiceError::Rule(RelationshipError::SelfTarget) => {
                ApiError::bad_request("Cannot target your own account", None)
            }
            SocialServiceError::Rule(rule) => {
                ApiError::conflict("Relationship change refused", Some(rule.to_string()))
            }
            SocialServiceError::Repo(err) => repo_to_api(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_errors_map_to_stable_codes() {
        let err = ApiError::from(PostServiceError::Rule(PostRuleError::AlreadyApproved));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::CONFLICT);

        let err = ApiError::from(SocialServiceError::Rule(
            RelationshipError::IncomingRequestPending,
        ));
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ApiError::from(AuthError::Expired);
        assert_eq!(err.code(), codes::EXPIRED);

        let err = repo_to_api(RepoError::Duplicate {
            constraint: "users_username_key".into(),
        });
        assert_eq!(err.code(), codes::DUPLICATE);
    }

    #[test]
    fn rate_limited_response_sets_retry_after() {
        let response = ApiError::rate_limited(30);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "30"
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
