//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the circles API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gift Circles API",
        version = "0.1.0",
        description = "Circles, rounds, percentage allocations and on-chain settlement of round payouts, less the treasury fee."
    ),
    paths(
        crate::routes::circles::create_circle,
        crate::routes::circles::get_circle,
        crate::routes::circles::join_circle,
        crate::routes::circles::start_round,
        crate::routes::circles::get_round,
        crate::routes::circles::allocate,
        crate::routes::circles::finalize_round,
    ),
    components(schemas(
        crate::routes::circles::CreateCircleRequest,
        crate::routes::circles::JoinCircleRequest,
        crate::routes::circles::StartRoundRequest,
        crate::routes::circles::AllocateRequest,
        crate::routes::circles::CircleResponse,
        crate::routes::circles::MemberResponse,
        crate::routes::circles::RoundResponse,
        crate::routes::circles::PayoutResponse,
        crate::routes::circles::JoinCircleResponse,
        crate::routes::circles::AllocationResponse,
        crate::routes::circles::FinalizeResponse,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "circles", description = "Gift circle lifecycle and settlement"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
