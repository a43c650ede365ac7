pub mod routes;
pub mod state;
pub mod ws;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/image", post(routes::upload_image))
        .route("/api/reset", post(routes::reset_session))
        .route("/api/snapshot", get(routes::get_snapshot))
        .route("/api/render.png", get(routes::get_render_png))
        .route("/ws/session", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
