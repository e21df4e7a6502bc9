//! Per-request HTTP middleware.
//!
//! # Responsibilities
//! - Assign a correlation ID to every request and echo it on the response
//! - Log path, host and duration of each request
//! - Record request counts and latencies by final status
//!
//! # Design Decisions
//! - An incoming `X-Request-ID` is kept as-is so IDs survive across hops
//! - All three are plain `from_fn` middleware; ordering is set by the router

use std::time::Instant;

use axum::extract::Request;
use axum::http::header::HOST;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::observability::metrics;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Ensure the request and its response carry an `X-Request-ID`.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = match req.headers().get(&X_REQUEST_ID) {
        Some(existing) => Some(existing.clone()),
        None => {
            let generated = HeaderValue::try_from(Uuid::new_v4().to_string()).ok();
            if let Some(value) = &generated {
                req.headers_mut().insert(X_REQUEST_ID.clone(), value.clone());
            }
            generated
        }
    };

    let mut response = next.run(req).await;

    if let Some(id) = id {
        if !response.headers().contains_key(&X_REQUEST_ID) {
            response.headers_mut().insert(X_REQUEST_ID.clone(), id);
        }
    }
    response
}

/// Log each request once it completes.
pub async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        request_id = %request_id,
        path = %path,
        host = %host,
        status = response.status().as_u16(),
        duration_ms,
        "request served"
    );
    response
}

/// Record metrics for the final response status.
pub async fn code_stats(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    metrics::record_http_request(&method, &path, response.status().as_u16(), start);
    response
}
