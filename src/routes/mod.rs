// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::Panels;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) panels: Arc<Panels>,
}

pub fn app(panels: Arc<Panels>) -> Router {
    let state = AppState { panels };
    Router::new()
        .route("/", get(|| async { "rollout-monitor" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/panels", get(http::list_panels)) // GET /api/panels
        .route(
            "/api/panels/{plugin_id}",
            get(http::get_panel)
                .put(http::mount_panel)
                .delete(http::dispose_panel),
        ) // GET | PUT | DELETE /api/panels/{plugin_id}
        .route("/api/panels/{plugin_id}/text", get(http::panel_text)) // GET /api/panels/{plugin_id}/text
        .route("/api/panels/{plugin_id}/approve", post(http::approve)) // POST /api/panels/{plugin_id}/approve
        .route("/api/panels/{plugin_id}/cancel", post(http::cancel)) // POST /api/panels/{plugin_id}/cancel
        .route("/ws/panels/{plugin_id}", get(ws::ws_panel)) // WS /ws/panels/{plugin_id}
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
