use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{error::ErrorReport, sessions::SessionPrincipal};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id for one request, echoed back in `x-request-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
}

impl RequestContext {
    /// Reuse a well-formed id supplied by the caller, otherwise mint one.
    fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self { request_id }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// What the error layer left behind for a failed response.
#[derive(Debug)]
struct Failure {
    source: &'static str,
    detail: String,
    chain: Vec<String>,
}

impl Failure {
    fn from_report(report: Option<ErrorReport>) -> Self {
        match report {
            Some(report) => Self {
                source: report.source,
                detail: report
                    .messages
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "no diagnostic available".to_string()),
                chain: report.messages,
            },
            None => Self {
                source: "unknown",
                detail: "no diagnostic available".to_string(),
                chain: Vec::new(),
            },
        }
    }
}

/// Log 4xx at warn and 5xx at error; successes pass through silently.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.to_string())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let elapsed_ms = start.elapsed().as_millis();
    let session_id = response
        .extensions()
        .get::<SessionPrincipal>()
        .map(|principal| principal.session_id.to_string())
        .unwrap_or_default();
    let failure = Failure::from_report(response.extensions_mut().remove::<ErrorReport>());

    if status.is_server_error() {
        error!(
            target = "hearth::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = failure.source,
            detail = %failure.detail,
            chain = ?failure.chain,
            request_id = %request_id,
            session_id = %session_id,
            "request failed",
        );
    } else {
        warn!(
            target = "hearth::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source = failure.source,
            detail = %failure.detail,
            request_id = %request_id,
            session_id = %session_id,
            "client request error",
        );
    }

    response
}
