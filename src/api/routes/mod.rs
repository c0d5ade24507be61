pub mod dot_state;
pub mod list;

use axum::{routing::get, Router};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_routes))
        .route("/{route_id}/dot-state", get(dot_state::get_dot_state))
}
