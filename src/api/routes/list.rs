use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_id: i32,
    pub description: String,
    pub west_name: String,
    pub east_name: String,
    pub crossing_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteListResponse {
    pub routes: Vec<RouteSummary>,
    pub total_count: usize,
}

/// List the supported ferry routes
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "List of supported routes", body = RouteListResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes() -> Json<RouteListResponse> {
    let routes: Vec<RouteSummary> = catalog::routes()
        .iter()
        .map(|r| RouteSummary {
            route_id: r.route_id,
            description: r.description.to_string(),
            west_name: r.west_name.to_string(),
            east_name: r.east_name.to_string(),
            crossing_minutes: r.crossing_minutes,
        })
        .collect();
    let total_count = routes.len();
    Json(RouteListResponse {
        routes,
        total_count,
    })
}
