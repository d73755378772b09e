//! REST handlers of the development gateway.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use super::error::{GatewayApiError, GatewayApiResult};
use super::state::GatewayState;
use crate::gateway::{
    IngestRequest, LoginRequest, LoginResponse, Property, RegisterPropertyRequest,
    RegisterRequest, ReportEntry,
};

/// Resolve the `Authorization: Bearer` header to an account
async fn authenticate(state: &GatewayState, headers: &HeaderMap) -> GatewayApiResult<String> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(GatewayApiError::Unauthorized)?;

    state.authenticate(token).await
}

/// POST /api/users/login
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<LoginRequest>,
) -> GatewayApiResult<Json<LoginResponse>> {
    let token = state.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

/// POST /api/users/register
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RegisterRequest>,
) -> GatewayApiResult<StatusCode> {
    state
        .register(&req.full_name, &req.email, &req.password)
        .await?;
    Ok(StatusCode::CREATED)
}

/// GET /api/users/properties
pub async fn list_properties(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> GatewayApiResult<Json<Vec<Property>>> {
    let email = authenticate(&state, &headers).await?;
    Ok(Json(state.properties(&email).await))
}

/// POST /api/users/register-property
pub async fn register_property(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterPropertyRequest>,
) -> GatewayApiResult<(StatusCode, Json<Property>)> {
    let email = authenticate(&state, &headers).await?;
    let property = state.register_property(&email, &req.address).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

/// GET /api/recommendations/property/:id
pub async fn property_report(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> GatewayApiResult<Json<Vec<ReportEntry>>> {
    let email = authenticate(&state, &headers).await?;
    Ok(Json(state.report(&email, &property_id).await?))
}

/// POST /api/billing/ingest
///
/// Returns `202 Accepted`: clients should not assume the report already
/// contains the reading.
pub async fn ingest(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(req): Json<IngestRequest>,
) -> GatewayApiResult<(StatusCode, Json<ReportEntry>)> {
    let email = authenticate(&state, &headers).await?;
    let entry = state
        .ingest(&email, &req.property_id, req.kwh_used)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(entry)))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
