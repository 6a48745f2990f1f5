use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use metrics::counter;
use tracing::debug;

use crate::application::sessions::{AuthError, SessionPrincipal};

use super::error::ApiError;
use super::state::ApiState;

/// Bucket for rejected session tokens, keyed by peer.
const AUTH_FAILURES: &str = "auth-failures";

/// Require a valid session and expose it as an `Extension<SessionPrincipal>`.
/// A peer that keeps presenting bad tokens is refused before lookup.
pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers(), &state.cookie.name) else {
        return ApiError::from(AuthError::Missing).into_response();
    };

    let peer = client_key(&request);
    if state.rate_limiter.exhausted(&peer, AUTH_FAILURES) {
        counter!("hearth_api_rate_limited_total").increment(1);
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let principal = match state.sessions.authenticate(&token).await {
        Ok(principal) => principal,
        Err(err) => {
            state.rate_limiter.allow(&peer, AUTH_FAILURES);
            debug!(
                target = "hearth::api::auth",
                peer = %peer,
                error = %err,
                "session refused"
            );
            return ApiError::from(err).into_response();
        }
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    // Surfaced to the outer logging layer.
    response.extensions_mut().insert(principal);
    response
}

/// Per-client request budget. Authenticated requests are keyed by session,
/// anonymous ones by peer address.
pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = client_key(&request);

    let (allowed, remaining) = state.rate_limiter.allow(&key, &route);
    if !allowed {
        counter!("hearth_api_rate_limited_total").increment(1);
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }
    debug!(
        target = "hearth::api::ratelimit",
        key = %key,
        route = %route,
        remaining,
        limit = state.rate_limiter.limit(),
        "request admitted"
    );

    next.run(request).await
}

fn client_key(request: &Request<Body>) -> String {
    if let Some(principal) = request.extensions().get::<SessionPrincipal>() {
        return format!("session:{}", principal.session_id);
    }
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("peer:{}", addr.ip()),
        None => "peer:unknown".to_string(),
    }
}

/// Bearer header first, then the session cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(
            session_token(&headers, "token").as_deref(),
            Some("from-cookie")
        );

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            session_token(&headers, "token").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(session_token(&headers, "token"), None);
    }
}
