// Traffic snapshot models as reported by the registry

use serde::{Deserialize, Serialize};

/// Whether a rollout completes on its own or waits for operator approval.
/// Serializes to lowercase JSON ("auto", "manual"); a missing field means auto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetail {
    /// Composite form `author/pluginId:version@checksum`.
    pub package_identifier: String,
    pub connection_count: u64,
}

impl VersionDetail {
    pub fn new(package_identifier: impl Into<String>, connection_count: u64) -> Self {
        Self {
            package_identifier: package_identifier.into(),
            connection_count,
        }
    }
}

/// One point-in-time report of traffic across versions of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub plugin_id: String,
    #[serde(default)]
    pub total_connections: u64,
    #[serde(default)]
    pub blue_green_active: bool,
    #[serde(default)]
    pub mode: RolloutMode,
    #[serde(default)]
    pub active_version: Option<VersionDetail>,
    /// Server-reported order is preserved; the first entry is the default rollback target.
    #[serde(default)]
    pub draining_versions: Vec<VersionDetail>,
}

impl Snapshot {
    /// True when any draining version still holds live connections.
    pub fn has_live_draining(&self) -> bool {
        self.draining_versions
            .iter()
            .any(|v| v.connection_count > 0)
    }

    /// Every version carried by this snapshot, active first.
    pub fn versions(&self) -> impl Iterator<Item = &VersionDetail> {
        self.active_version
            .iter()
            .chain(self.draining_versions.iter())
    }
}

/// Registry response envelope; only the first entry is consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotList {
    #[serde(default)]
    pub list: Vec<Snapshot>,
}

impl SnapshotList {
    pub fn into_first(self) -> Option<Snapshot> {
        self.list.into_iter().next()
    }
}
