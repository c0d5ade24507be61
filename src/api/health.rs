use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::catalog;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Number of routes in the catalog
    pub route_count: usize,
    /// Lanes currently held in the last-good cache
    pub cached_lane_count: usize,
    /// Vessels with a learned sticky maximum capacity
    pub sticky_vessel_count: usize,
    /// Server version
    pub server_version: String,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        route_count: catalog::routes().len(),
        cached_lane_count: state.assembler.cached_lane_count(),
        sticky_vessel_count: state.assembler.sticky_vessel_count(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
