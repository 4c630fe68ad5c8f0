// Panel events pushed to WebSocket subscribers

use serde::{Deserialize, Serialize};

use super::PanelView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Serializes as `{"type": "view" | "notice" | "refresh", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PanelEvent {
    View(PanelView),
    Notice { kind: NoticeKind, message: String },
    Refresh { plugin_id: String },
}
