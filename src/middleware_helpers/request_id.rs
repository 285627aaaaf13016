use crate::tracing::RequestId;
use std::time::{Duration, Instant};
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Requests running longer than this are logged at `warn`.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(2);

/// Accepts a client supplied id only when it is short, visible ASCII.
fn sanitize_incoming(value: &str) -> Option<RequestId> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_REQUEST_ID_LEN
        || !trimmed.bytes().all(|b| b.is_ascii_graphic())
    {
        return None;
    }
    Some(RequestId::new(trimmed))
}

/// Middleware to add request ID to every request
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(sanitize_incoming)
        .unwrap_or_default();

    let header_value = HeaderValue::from_str(request_id.as_str()).ok();
    if let Some(value) = header_value.clone() {
        request
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    // Make request id available to handlers
    request.extensions_mut().insert(request_id.clone());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let mut response = crate::tracing::scope_request_id(request_id, async move {
        let started = Instant::now();
        let response = next.run(request).await;
        crate::tracing::log_slow_request(&method, &path, started.elapsed(), SLOW_REQUEST_THRESHOLD);
        response
    })
    .await;

    if let Some(value) = header_value {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
