//! # Circles API
//!
//! Routes:
//! - POST   /v1/circles: Create a circle
//! - GET    /v1/circles/{circle_id}: Circle snapshot
//! - POST   /v1/circles/{circle_id}/join: Add a member
//! - POST   /v1/circles/{circle_id}/rounds: Start a round
//! - GET    /v1/circles/{circle_id}/rounds/{round_id}: Round snapshot
//! - POST   /v1/circles/{circle_id}/rounds/{round_id}/allocate: Replace a contributor's split
//! - POST   /v1/circles/{circle_id}/rounds/{round_id}/finalize: Settle and close a round
//!
//! Every POST passes the whitelist middleware first. Handlers translate
//! DTOs to domain values and delegate to the ledger; no business rules
//! live here.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use circles_core::{CircleId, MemberId, Percentage, RoundId, WalletAddress};
use circles_state::{AllocationMap, Circle, Member, PayoutRecord, Round};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerAddress;
use crate::error::AppError;
use crate::extractors::{extract_optional_json, extract_validated_json, parse_amount, Validate};
use crate::state::AppState;

// -- Requests -------------------------------------------------------------------

/// Request to create a circle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCircleRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Decimal string or number. Defaults to `"0"`.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "1000")]
    pub funding_pool: Option<serde_json::Value>,
    /// Whitelisted address of the caller.
    #[serde(default)]
    pub creator: Option<String>,
}

impl Validate for CreateCircleRequest {
    fn validate(&self) -> Result<(), String> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err("name is required".to_string()),
        }
    }
}

/// Request to join a circle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinCircleRequest {
    #[serde(default)]
    pub address: Option<String>,
    /// Display name. Defaults to `"Anonymous"`.
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for JoinCircleRequest {
    fn validate(&self) -> Result<(), String> {
        match self.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Ok(()),
            _ => Err("address is required".to_string()),
        }
    }
}

/// Request to start a round. The body may be omitted entirely.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartRoundRequest {
    /// Decimal string or number. Defaults to the circle's funding pool.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "300")]
    pub round_budget: Option<serde_json::Value>,
}

/// A contributor's split of their share among other members.
///
/// Member ids are taken as plain strings: an id that is not a UUID names
/// no member and is reported like any other unknown member.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AllocateRequest {
    #[serde(default)]
    #[schema(value_type = Option<Uuid>)]
    pub from_member_id: Option<String>,
    /// Target member id → percentage in [0, 100]. Sum at most 100.
    #[serde(default)]
    #[schema(value_type = Option<BTreeMap<Uuid, f64>>)]
    pub allocations: Option<BTreeMap<String, f64>>,
}

impl Validate for AllocateRequest {
    fn validate(&self) -> Result<(), String> {
        if self.from_member_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            return Err("from_member_id is required".to_string());
        }
        if self.allocations.is_none() {
            return Err("allocations is required".to_string());
        }
        Ok(())
    }
}

// -- Responses ------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub id: Uuid,
    pub address: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

impl From<&Member> for MemberResponse {
    fn from(m: &Member) -> Self {
        Self {
            id: m.id.0,
            address: m.address.to_string(),
            name: m.name.clone(),
            joined_at: m.joined_at,
        }
    }
}

/// One paid member of a finalized round.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PayoutResponse {
    pub member_id: Uuid,
    pub address: String,
    /// Amount paid to the member, after the treasury fee.
    pub amount: String,
    pub fee: String,
    pub transaction_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_transaction_ref: Option<String>,
}

impl From<&PayoutRecord> for PayoutResponse {
    fn from(p: &PayoutRecord) -> Self {
        Self {
            member_id: p.member_id.0,
            address: p.address.to_string(),
            amount: p.amount.to_string(),
            fee: p.fee.to_string(),
            transaction_ref: p.transaction_ref.clone(),
            fee_transaction_ref: p.fee_transaction_ref.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoundResponse {
    pub id: Uuid,
    pub budget: String,
    /// `open` or `finalized`.
    pub status: String,
    /// Contributor member id → (target member id → percentage).
    pub allocations: BTreeMap<Uuid, BTreeMap<Uuid, f64>>,
    /// `null` until the round is finalized.
    pub results: Option<Vec<PayoutResponse>>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&Round> for RoundResponse {
    fn from(r: &Round) -> Self {
        Self {
            id: r.id().0,
            budget: r.budget().to_string(),
            status: r.status().as_str().to_string(),
            allocations: r
                .allocations()
                .iter()
                .map(|(from, split)| (from.0, split_to_wire(split)))
                .collect(),
            results: r
                .results()
                .map(|results| results.iter().map(PayoutResponse::from).collect()),
            created_at: r.created_at(),
            finalized_at: r.finalized_at(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CircleResponse {
    pub id: Uuid,
    pub name: String,
    pub funding_pool: String,
    pub members: Vec<MemberResponse>,
    pub rounds: Vec<RoundResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Circle> for CircleResponse {
    fn from(c: &Circle) -> Self {
        Self {
            id: c.id().0,
            name: c.name().to_string(),
            funding_pool: c.funding_pool().to_string(),
            members: c.members().iter().map(MemberResponse::from).collect(),
            rounds: c.rounds().iter().map(RoundResponse::from).collect(),
            created_at: c.created_at(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinCircleResponse {
    pub member_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AllocationResponse {
    pub from_member_id: Uuid,
    pub allocations: BTreeMap<Uuid, f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FinalizeResponse {
    pub round_id: Uuid,
    pub results: Vec<PayoutResponse>,
}

fn split_to_wire(split: &AllocationMap) -> BTreeMap<Uuid, f64> {
    split.iter().map(|(to, pct)| (to.0, pct.value())).collect()
}

// -- Path helpers ------------------------------------------------------------------

fn circle_path(path: Result<Path<Uuid>, PathRejection>) -> Result<CircleId, AppError> {
    path.map(|Path(id)| CircleId(id))
        .map_err(|e| AppError::NotFound(format!("circle: {}", e.body_text())))
}

fn round_path(
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<(CircleId, RoundId), AppError> {
    path.map(|Path((circle, round))| (CircleId(circle), RoundId(round)))
        .map_err(|e| AppError::NotFound(format!("round: {}", e.body_text())))
}

// -- Router -------------------------------------------------------------------------

/// Build the circles router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/circles", post(create_circle))
        .route("/v1/circles/{circle_id}", get(get_circle))
        .route("/v1/circles/{circle_id}/join", post(join_circle))
        .route("/v1/circles/{circle_id}/rounds", post(start_round))
        .route("/v1/circles/{circle_id}/rounds/{round_id}", get(get_round))
        .route(
            "/v1/circles/{circle_id}/rounds/{round_id}/allocate",
            post(allocate),
        )
        .route(
            "/v1/circles/{circle_id}/rounds/{round_id}/finalize",
            post(finalize_round),
        )
}

/// POST /v1/circles: Create a circle.
#[utoipa::path(
    post,
    path = "/v1/circles",
    request_body = CreateCircleRequest,
    responses(
        (status = 201, description = "Circle created", body = CircleResponse),
        (status = 403, description = "Caller not whitelisted", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn create_circle(
    State(state): State<AppState>,
    caller: CallerAddress,
    body: Result<Json<CreateCircleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CircleResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let funding_pool = parse_amount("funding_pool", req.funding_pool.as_ref())?;
    let name = req.name.unwrap_or_default();

    let circle = state.ledger.create_circle(&name, funding_pool)?;
    tracing::debug!(circle_id = %circle.id(), requested_by = %caller.0, "create circle handled");
    Ok((StatusCode::CREATED, Json(CircleResponse::from(&circle))))
}

/// GET /v1/circles/{circle_id}: Circle snapshot.
#[utoipa::path(
    get,
    path = "/v1/circles/{circle_id}",
    params(("circle_id" = Uuid, Path, description = "Circle ID")),
    responses(
        (status = 200, description = "Circle found", body = CircleResponse),
        (status = 404, description = "Circle not found", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn get_circle(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CircleResponse>, AppError> {
    let circle_id = circle_path(path)?;
    let circle = state.ledger.get_circle(circle_id)?;
    Ok(Json(CircleResponse::from(&circle)))
}

/// POST /v1/circles/{circle_id}/join: Add a member.
#[utoipa::path(
    post,
    path = "/v1/circles/{circle_id}/join",
    params(("circle_id" = Uuid, Path, description = "Circle ID")),
    request_body = JoinCircleRequest,
    responses(
        (status = 201, description = "Member added", body = JoinCircleResponse),
        (status = 404, description = "Circle not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid or duplicate address", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn join_circle(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<JoinCircleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JoinCircleResponse>), AppError> {
    let circle_id = circle_path(path)?;
    let req = extract_validated_json(body)?;
    let address = WalletAddress::parse(req.address.as_deref().unwrap_or_default())?;

    let member = state.ledger.join_circle(circle_id, address, req.name)?;
    Ok((
        StatusCode::CREATED,
        Json(JoinCircleResponse {
            member_id: member.id.0,
        }),
    ))
}

/// POST /v1/circles/{circle_id}/rounds: Start a round.
#[utoipa::path(
    post,
    path = "/v1/circles/{circle_id}/rounds",
    params(("circle_id" = Uuid, Path, description = "Circle ID")),
    request_body(content = StartRoundRequest, description = "Optional"),
    responses(
        (status = 201, description = "Round started", body = RoundResponse),
        (status = 404, description = "Circle not found", body = crate::error::ErrorBody),
        (status = 422, description = "Fewer than two members", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn start_round(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<RoundResponse>), AppError> {
    let circle_id = circle_path(path)?;
    let req: StartRoundRequest = extract_optional_json(&body)?;
    let budget = parse_amount("round_budget", req.round_budget.as_ref())?;

    let round = state.ledger.start_round(circle_id, budget)?;
    Ok((StatusCode::CREATED, Json(RoundResponse::from(&round))))
}

/// GET /v1/circles/{circle_id}/rounds/{round_id}: Round snapshot.
#[utoipa::path(
    get,
    path = "/v1/circles/{circle_id}/rounds/{round_id}",
    params(
        ("circle_id" = Uuid, Path, description = "Circle ID"),
        ("round_id" = Uuid, Path, description = "Round ID"),
    ),
    responses(
        (status = 200, description = "Round found", body = RoundResponse),
        (status = 404, description = "Circle or round not found", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn get_round(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Json<RoundResponse>, AppError> {
    let (circle_id, round_id) = round_path(path)?;
    let round = state.ledger.get_round(circle_id, round_id)?;
    Ok(Json(RoundResponse::from(&round)))
}

/// POST /v1/circles/{circle_id}/rounds/{round_id}/allocate: Replace a contributor's split.
#[utoipa::path(
    post,
    path = "/v1/circles/{circle_id}/rounds/{round_id}/allocate",
    params(
        ("circle_id" = Uuid, Path, description = "Circle ID"),
        ("round_id" = Uuid, Path, description = "Round ID"),
    ),
    request_body = AllocateRequest,
    responses(
        (status = 200, description = "Allocation stored", body = AllocationResponse),
        (status = 404, description = "Circle or round not found", body = crate::error::ErrorBody),
        (status = 422, description = "Round closed or split invalid", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn allocate(
    State(state): State<AppState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    body: Result<Json<AllocateRequest>, JsonRejection>,
) -> Result<Json<AllocationResponse>, AppError> {
    let (circle_id, round_id) = round_path(path)?;
    let req = extract_validated_json(body)?;
    // Missing circles and rounds are reported before unknown members.
    let unknown_member = |msg: String| match state.ledger.get_round(circle_id, round_id) {
        Ok(_) => AppError::Validation(msg),
        Err(e) => e.into(),
    };

    let raw_from = req.from_member_id.unwrap_or_default();
    let from = member_id(&raw_from).ok_or_else(|| {
        unknown_member(format!("contributor {raw_from} is not a member of this circle"))
    })?;
    let mut split = AllocationMap::new();
    for (to, pct) in req.allocations.unwrap_or_default() {
        let target = member_id(&to).ok_or_else(|| {
            unknown_member(format!("allocation target {to} is not a member of this circle"))
        })?;
        split.insert(target, Percentage::new(pct)?);
    }

    let stored = state.ledger.allocate(circle_id, round_id, from, split)?;
    Ok(Json(AllocationResponse {
        from_member_id: from.0,
        allocations: split_to_wire(&stored),
    }))
}

/// Parse a member id; anything that is not a UUID names no member.
fn member_id(raw: &str) -> Option<MemberId> {
    Uuid::parse_str(raw.trim()).ok().map(MemberId)
}

/// POST /v1/circles/{circle_id}/rounds/{round_id}/finalize: Settle and close a round.
///
/// Transfers the treasury fee and the payout for every member with a
/// positive total. On a settlement failure the round stays open and a
/// retry resumes where the failed attempt stopped.
#[utoipa::path(
    post,
    path = "/v1/circles/{circle_id}/rounds/{round_id}/finalize",
    params(
        ("circle_id" = Uuid, Path, description = "Circle ID"),
        ("round_id" = Uuid, Path, description = "Round ID"),
    ),
    responses(
        (status = 200, description = "Round finalized", body = FinalizeResponse),
        (status = 404, description = "Circle or round not found", body = crate::error::ErrorBody),
        (status = 422, description = "Round already finalized", body = crate::error::ErrorBody),
        (status = 502, description = "A settlement transfer failed", body = crate::error::ErrorBody),
    ),
    tag = "circles"
)]
async fn finalize_round(
    State(state): State<AppState>,
    caller: CallerAddress,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (circle_id, round_id) = round_path(path)?;
    tracing::info!(%circle_id, %round_id, requested_by = %caller.0, "finalize requested");

    let results = state.ledger.finalize(circle_id, round_id).await?;
    Ok(Json(FinalizeResponse {
        round_id: round_id.0,
        results: results.iter().map(PayoutResponse::from).collect(),
    }))
}
