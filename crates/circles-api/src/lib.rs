//! # circles-api: Axum API Services for Gift Circles
//!
//! HTTP surface over the circle ledger. Handlers translate JSON to domain
//! values and delegate; the ledger owns every rule.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                 | Gated |
//! |---------------------------|------------------------|-------|
//! | `/v1/circles/*`           | [`routes::circles`]    | POST only |
//! | `/openapi.json`           | [`openapi`]            | no |
//! | `/health/*`, `/metrics`   | this module            | no |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → WhitelistMiddleware → Handler
//! ```
//!
//! The whitelist middleware is a route layer, so unknown paths answer 404
//! rather than asking for a wallet address.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::Router;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let circles = routes::circles::router().route_layer(from_fn_with_state(
        state.clone(),
        auth::whitelist_middleware,
    ));

    let api = Router::new()
        .merge(circles)
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer());

    let ops = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(prometheus_metrics));

    Router::new().merge(ops).merge(api).with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics: Prometheus scrape endpoint.
///
/// Refreshes the gauges derived from ledger state, then renders every
/// recorded metric in the text exposition format. Answers 404 when no
/// recorder was installed.
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let Some(handle) = &state.metrics else {
        return AppError::NotFound("metrics exporter not installed".to_string()).into_response();
    };
    metrics::gauge!("circles_circles_total").set(state.ledger.circle_count() as f64);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}
