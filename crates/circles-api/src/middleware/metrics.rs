//! # Request Metrics
//!
//! Records `circles_http_requests_total` (labels `method`, `route`,
//! `status`) and `circles_http_request_duration_seconds` through the
//! `metrics` facade. Routes are labelled by their matched template, never
//! the raw URI, so circle and round ids do not explode label cardinality.
//!
//! Without an installed recorder the macros are no-ops.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Label used for requests that matched no route.
const UNMATCHED: &str = "unmatched";

/// Middleware that counts requests and times them.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "circles_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "circles_http_request_duration_seconds",
        "method" => method,
        "route" => route
    )
    .record(started.elapsed().as_secs_f64());

    response
}
