//! Measurement route handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use meter_common::types::{Measurement, PageEnvelope};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::service::{Endpoint, PageRequest};

pub const DEFAULT_TOTAL: u32 = 100;
pub const MAX_TOTAL: u32 = 1000;
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_SIZE: u32 = 10;
pub const MAX_SIZE: u32 = 100;
pub const DEFAULT_LEGACY_COUNT: u32 = 5;
pub const MAX_LEGACY_COUNT: u32 = 100;

/// Query parameters of the paginated endpoints
#[derive(Debug, Deserialize)]
pub struct PageParamsQuery {
    #[serde(default = "default_total")]
    pub total: u32,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
    pub device_id: Option<String>,
}

impl PageParamsQuery {
    fn into_request(self) -> ServiceResult<PageRequest> {
        check_range("total", self.total, 1, MAX_TOTAL)?;
        check_range("page", self.page, 1, u32::MAX)?;
        check_range("size", self.size, 1, MAX_SIZE)?;

        Ok(PageRequest {
            total: self.total,
            page: self.page,
            size: self.size,
            device_id: self.device_id.filter(|d| !d.is_empty()),
        })
    }
}

/// Query parameters of the legacy endpoint
#[derive(Debug, Deserialize)]
pub struct LegacyQuery {
    #[serde(default = "default_legacy_count")]
    pub count: u32,
    pub device_id: Option<String>,
}

fn default_total() -> u32 {
    DEFAULT_TOTAL
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_size() -> u32 {
    DEFAULT_SIZE
}

fn default_legacy_count() -> u32 {
    DEFAULT_LEGACY_COUNT
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> ServiceResult<()> {
    if value < min || value > max {
        return Err(ServiceError::InvalidRequest(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> ServiceResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| ServiceError::InvalidRequest(rejection.body_text()))
}

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Device Measurements API" }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Legacy listing without pagination
///
/// GET /measurements?count=5&device_id=device_1
pub async fn legacy_measurements(
    State(state): State<AppState>,
    query: Result<Query<LegacyQuery>, QueryRejection>,
) -> ServiceResult<Json<Vec<Measurement>>> {
    let query = parse_query(query)?;
    check_range("count", query.count, 1, MAX_LEGACY_COUNT)?;
    tracing::warn!(
        count = query.count,
        "Deprecated endpoint /measurements called; use /measurements/page"
    );

    let device_id = query.device_id.as_deref().filter(|d| !d.is_empty());
    Ok(Json(state.service.legacy(query.count, device_id)))
}

/// Page-based pagination
///
/// GET /measurements/page?total=100&page=1&size=10&device_id=device_1
pub async fn page_measurements(
    State(state): State<AppState>,
    query: Result<Query<PageParamsQuery>, QueryRejection>,
) -> ServiceResult<Json<PageEnvelope<Measurement>>> {
    serve(&state, query, Endpoint::Reliable)
}

/// Page-based pagination that fails with 500 at a fixed probability
///
/// GET /measurements/very-reliable?total=100&page=1&size=10
pub async fn unreliable_measurements(
    State(state): State<AppState>,
    query: Result<Query<PageParamsQuery>, QueryRejection>,
) -> ServiceResult<Json<PageEnvelope<Measurement>>> {
    serve(&state, query, Endpoint::Unreliable)
}

fn serve(
    state: &AppState,
    query: Result<Query<PageParamsQuery>, QueryRejection>,
    endpoint: Endpoint,
) -> ServiceResult<Json<PageEnvelope<Measurement>>> {
    let request = parse_query(query)?.into_request()?;
    state.service.fetch_page(&request, endpoint).map(Json)
}
