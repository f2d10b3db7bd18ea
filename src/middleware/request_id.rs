//! Request ID middleware for log correlation.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuses a well-formed inbound `x-request-id`, otherwise generates one.
/// The id is attached to the request extensions, the tracing span, and the
/// response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_valid_request_id(id))
        .map(|id| RequestId(id.to_string()))
        .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()));

    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), header_value);
    }
    response
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_ids() {
        assert!(is_valid_request_id("abc123"));
        assert!(is_valid_request_id("abc-123_xyz"));
        assert!(is_valid_request_id(&"a".repeat(128)));
    }

    #[test]
    fn test_invalid_request_ids() {
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("abc 123"));
        assert!(!is_valid_request_id("abc/123"));
        assert!(!is_valid_request_id(&"a".repeat(129)));
    }
}
