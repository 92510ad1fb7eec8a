//! Correlation-ID middleware
//!
//! Honors an inbound `x-correlation-id` header or generates a UUID, and
//! echoes it on the response so clients and logs can be matched up.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::observability::Logger;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

pub async fn correlation_id(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    Logger::debug(
        "REQUEST_RECEIVED",
        &[
            ("correlation_id", correlation_id.as_str()),
            ("method", method.as_str()),
            ("path", path.as_str()),
        ],
    );

    let mut response = next.run(request).await;

    if response.status().is_server_error() || response.status().is_client_error() {
        Logger::warn(
            "REQUEST_FAILED",
            &[
                ("correlation_id", correlation_id.as_str()),
                ("method", method.as_str()),
                ("path", path.as_str()),
                ("status", response.status().as_str()),
            ],
        );
    }

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
