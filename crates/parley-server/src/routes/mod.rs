//! HTTP routes for the status and control surface.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod scene;

/// Builds the full router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(scene::router())
        .with_state(state)
}
