// Rendered panel view: what the presentation layer shows per snapshot

use serde::{Deserialize, Serialize};

use super::RolloutMode;

/// Lifecycle phase of a mounted panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    FirstObservation,
    Monitoring,
    RollingBack,
    Hidden,
}

/// Mode badge; `Rollback` overrides the server mode while rolling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeBadge {
    Auto,
    Manual,
    Rollback,
}

impl ModeBadge {
    pub fn for_state(mode: RolloutMode, phase: Phase) -> Self {
        match (phase, mode) {
            (Phase::RollingBack, _) => ModeBadge::Rollback,
            (_, RolloutMode::Manual) => ModeBadge::Manual,
            (_, RolloutMode::Auto) => ModeBadge::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeBadge::Auto => "auto",
            ModeBadge::Manual => "manual",
            ModeBadge::Rollback => "rollback",
        }
    }
}

/// Operator control currently talking to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Approve,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRow {
    pub label: String,
    pub package_identifier: String,
    pub connections: u64,
    pub history: Vec<u64>,
    pub sparkline: String,
}

/// Manual-mode controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub approve_enabled: bool,
    pub cancel_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub plugin_id: String,
    pub visible: bool,
    pub phase: Phase,
    pub polling: bool,
    pub total_connections: u64,
    pub badge: ModeBadge,
    pub active: Option<VersionRow>,
    pub draining: Vec<VersionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<Controls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy: Option<ControlKind>,
}
