pub mod error;
pub mod health;
pub mod routes;

pub use error::ErrorResponse;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::services::assembler::Assembler;

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<Assembler>,
}

pub fn router(assembler: Arc<Assembler>) -> Router {
    let state = AppState { assembler };
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/routes", routes::router())
        .with_state(state)
}
