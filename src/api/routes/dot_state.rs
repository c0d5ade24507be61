use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::super::{error, AppState, ErrorResponse};
use crate::models::Snapshot;
use crate::services::assembler::AssembleError;

/// Build the dot-state snapshot for a route.
///
/// Upstream failures never surface as errors here: the snapshot
/// degrades per-field and `meta.reason` says what to distrust. Only an
/// unknown route is a 404.
#[utoipa::path(
    get,
    path = "/api/routes/{route_id}/dot-state",
    params(
        ("route_id" = i32, Path, description = "WSDOT route identifier")
    ),
    responses(
        (status = 200, description = "Dot-state snapshot for the route", body = Snapshot),
        (status = 404, description = "Unknown route", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_dot_state(
    State(state): State<AppState>,
    Path(route_id): Path<i32>,
) -> Result<Json<Snapshot>, (StatusCode, Json<ErrorResponse>)> {
    match state.assembler.build_snapshot(route_id).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(AssembleError::UnknownRoute(id)) => {
            Err(error::not_found(format!("Unknown route {}", id)))
        }
    }
}
