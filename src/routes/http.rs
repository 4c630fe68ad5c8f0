// HTTP handlers: version, panel lifecycle, rendered views, operator controls

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::error::ControlError;
use crate::monitor::Panel;
use crate::render::render_text;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(super) enum ApiError {
    NotMounted(String),
    Control(ControlError),
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError::Control(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotMounted(plugin_id) => (
                StatusCode::NOT_FOUND,
                format!("no panel mounted for {}", plugin_id),
            ),
            ApiError::Control(e) => {
                let status = match &e {
                    ControlError::UnknownTarget(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ControlError::PanelClosed => StatusCode::GONE,
                    ControlError::Registry(_) => StatusCode::BAD_GATEWAY,
                    ControlError::NoSnapshot
                    | ControlError::NoActiveRollout
                    | ControlError::NotManual { .. }
                    | ControlError::ConnectionsStillDraining { .. }
                    | ControlError::NothingToCancel => StatusCode::CONFLICT,
                };
                (status, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn mounted(state: &AppState, plugin_id: &str) -> Result<Arc<Panel>, ApiError> {
    state
        .panels
        .get(plugin_id)
        .await
        .ok_or_else(|| ApiError::NotMounted(plugin_id.to_string()))
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/panels: mounted plugin ids.
pub(super) async fn list_panels(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.panels.list().await)
}

/// PUT /api/panels/{plugin_id}: mount (idempotent while the panel is live).
pub(super) async fn mount_panel(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> impl IntoResponse {
    let panel = state.panels.mount(&plugin_id).await;
    (StatusCode::OK, Json(panel.handle.view()))
}

/// DELETE /api/panels/{plugin_id}: dispose; stops polling immediately.
pub(super) async fn dispose_panel(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.panels.dispose(&plugin_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotMounted(plugin_id))
    }
}

pub(super) async fn get_panel(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = mounted(&state, &plugin_id).await?;
    Ok(Json(panel.handle.view()))
}

pub(super) async fn panel_text(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = mounted(&state, &plugin_id).await?;
    Ok(render_text(&panel.handle.view()))
}

pub(super) async fn approve(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = mounted(&state, &plugin_id).await?;
    let view = panel.handle.approve().await?;
    Ok(Json(view))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CancelRequest {
    pub package_identifier: Option<String>,
}

/// POST /api/panels/{plugin_id}/cancel: body `{"packageIdentifier": ...}` is optional;
/// without it the first draining version is rolled back.
pub(super) async fn cancel(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = mounted(&state, &plugin_id).await?;
    let target = body.and_then(|Json(req)| req.package_identifier);
    let view = panel.handle.cancel(target).await?;
    Ok(Json(view))
}
