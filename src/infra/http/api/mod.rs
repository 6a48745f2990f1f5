pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::{ApiState, SessionCookie};

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};

/// `/api/v1` routes. Session routes sit behind the auth layer; every route is
/// rate limited.
pub fn build_api_router(state: ApiState) -> Router {
    let public = Router::new()
        .route("/api/v1/session", post(handlers::create_session))
        .route("/api/v1/feed", get(handlers::feed))
        .route("/api/v1/users/{id}", get(handlers::get_user))
        .route(
            "/api/v1/users/by-email/{email}",
            get(handlers::get_user_by_email),
        )
        .route(
            "/api/v1/users/by-username/{username}",
            get(handlers::get_user_by_username),
        )
        .route(
            "/api/v1/usernames/{username}",
            get(handlers::username_availability),
        )
        .route("/api/v1/health", get(handlers::health))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::api_rate_limit,
        ));

    let authenticated = Router::new()
        .route("/api/v1/session", delete(handlers::delete_session))
        .route(
            "/api/v1/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
        .route("/api/v1/users", post(handlers::register_user))
        .route("/api/v1/users/batch", post(handlers::get_users_batch))
        .route("/api/v1/posts", post(handlers::create_post))
        .route(
            "/api/v1/posts/{id}",
            patch(handlers::edit_post).delete(handlers::delete_post),
        )
        .route("/api/v1/posts/{id}/like", post(handlers::toggle_like))
        .route("/api/v1/posts/{id}/comments", post(handlers::add_comment))
        .route(
            "/api/v1/posts/{id}/comments/{comment_id}",
            patch(handlers::edit_comment).delete(handlers::delete_comment),
        )
        .route("/api/v1/moderation/pending", get(handlers::pending_posts))
        .route(
            "/api/v1/moderation/{id}/approve",
            post(handlers::approve_post),
        )
        .route("/api/v1/moderation/{id}/reject", post(handlers::reject_post))
        .route(
            "/api/v1/friends/{target}/request",
            put(handlers::send_friend_request).delete(handlers::cancel_friend_request),
        )
        .route(
            "/api/v1/friends/{target}/accept",
            post(handlers::accept_friend_request),
        )
        .route(
            "/api/v1/friends/{target}/reject",
            post(handlers::reject_friend_request),
        )
        .route("/api/v1/friends/{target}", delete(handlers::unfriend))
        .route(
            "/api/v1/follows/{target}",
            put(handlers::follow).delete(handlers::unfollow),
        )
        .route(
            "/api/v1/relationships/{target}",
            get(handlers::relationship),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::api_rate_limit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::api_auth,
        ));

    public.merge(authenticated).with_state(state)
}
