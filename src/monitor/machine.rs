// Rollout state machine: consumes snapshots and operator outcomes, returns effects.
// Pure state; the owning session performs every side effect it returns.

use std::collections::HashSet;

use crate::error::ControlError;
use crate::history::TrendHistory;
use crate::models::{ControlKind, NoticeKind, Phase, RolloutMode, Snapshot, VersionDetail};
use crate::version::version_label;

/// Side effects requested by a transition, in the order they must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify { kind: NoticeKind, message: String },
    Refresh,
    StopPolling,
}

#[derive(Debug)]
pub struct RolloutMachine {
    plugin_id: String,
    phase: Phase,
    polling: bool,
    previous_blue_green_active: Option<bool>,
    snapshot: Option<Snapshot>,
    history: TrendHistory,
    evict_stale_versions: bool,
}

impl RolloutMachine {
    pub fn new(plugin_id: impl Into<String>, history: TrendHistory) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            phase: Phase::FirstObservation,
            polling: true,
            previous_blue_green_active: None,
            snapshot: None,
            history,
            evict_stale_versions: false,
        }
    }

    /// Drop history for versions missing from two consecutive snapshots.
    pub fn with_stale_eviction(mut self, enabled: bool) -> Self {
        self.evict_stale_versions = enabled;
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn polling(&self) -> bool {
        self.polling
    }

    pub fn previous_blue_green_active(&self) -> Option<bool> {
        self.previous_blue_green_active
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn history(&self) -> &TrendHistory {
        &self.history
    }

    /// Evaluate one accepted snapshot.
    ///
    /// The first snapshot of a mount only records state: a panel may mount mid-rollout
    /// and must not read that as a completion. Afterwards an active -> inactive edge is
    /// a natural completion. Snapshots arriving after the panel is hidden are ignored.
    pub fn observe(&mut self, snapshot: Snapshot) -> Vec<Effect> {
        if self.phase == Phase::Hidden {
            return Vec::new();
        }

        for version in snapshot.versions() {
            self.history
                .append(&version.package_identifier, version.connection_count);
        }
        if self.evict_stale_versions {
            let present: HashSet<&str> = snapshot
                .versions()
                .map(|v| v.package_identifier.as_str())
                .collect();
            let evicted = self.history.evict_missing(&present);
            if !evicted.is_empty() {
                tracing::debug!(plugin_id = %self.plugin_id, ?evicted, "evicted stale version history");
            }
        }

        let active = snapshot.blue_green_active;
        let mut effects = Vec::new();
        match self.previous_blue_green_active {
            None => {
                if active {
                    self.phase = Phase::Monitoring;
                }
            }
            Some(true) if !active => {
                let message = if self.phase == Phase::RollingBack {
                    format!("Rollback of {} completed", self.plugin_id)
                } else {
                    format!("Rollout of {} completed", self.plugin_id)
                };
                effects = self.finish(message);
            }
            Some(_) => {
                if active && self.phase == Phase::FirstObservation {
                    self.phase = Phase::Monitoring;
                }
            }
        }
        self.previous_blue_green_active = Some(active);
        self.snapshot = Some(snapshot);
        effects
    }

    /// The panel is shown only while a rollout with draining versions is in progress.
    pub fn is_visible(&self) -> bool {
        self.phase != Phase::Hidden
            && self
                .snapshot
                .as_ref()
                .is_some_and(|s| s.blue_green_active && !s.draining_versions.is_empty())
    }

    /// Snapshot of a live manual-mode rollout, or why controls are unavailable.
    fn manual_rollout(&self, action: ControlKind) -> Result<&Snapshot, ControlError> {
        if self.phase == Phase::Hidden {
            return Err(ControlError::PanelClosed);
        }
        let snapshot = self.snapshot.as_ref().ok_or(ControlError::NoSnapshot)?;
        if !snapshot.blue_green_active {
            return Err(ControlError::NoActiveRollout);
        }
        if snapshot.mode != RolloutMode::Manual {
            return Err(ControlError::NotManual { action });
        }
        Ok(snapshot)
    }

    /// Approve is allowed only once every draining version is down to zero connections.
    pub fn check_approve(&self) -> Result<(), ControlError> {
        let snapshot = self.manual_rollout(ControlKind::Approve)?;
        let live = snapshot
            .draining_versions
            .iter()
            .filter(|v| v.connection_count > 0)
            .count();
        if live > 0 {
            return Err(ControlError::ConnectionsStillDraining { live });
        }
        Ok(())
    }

    pub fn approve_enabled(&self) -> bool {
        self.check_approve().is_ok()
    }

    /// Rollback target: the named draining version, or the first one when unnamed.
    pub fn cancel_target(&self, requested: Option<&str>) -> Result<&VersionDetail, ControlError> {
        let snapshot = self.manual_rollout(ControlKind::Cancel)?;
        match requested {
            Some(id) => snapshot
                .draining_versions
                .iter()
                .find(|v| v.package_identifier == id)
                .ok_or_else(|| ControlError::UnknownTarget(id.to_string())),
            None => snapshot
                .draining_versions
                .first()
                .ok_or(ControlError::NothingToCancel),
        }
    }

    /// The registry accepted an approve.
    pub fn approved(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Hidden {
            return Vec::new();
        }
        let message = format!("Rollout of {} approved", self.plugin_id);
        self.finish(message)
    }

    /// The registry accepted a cancel of `package_identifier`. Polling stays on so the
    /// operator can watch the new version drain.
    pub fn cancelled(&mut self, package_identifier: &str) -> Vec<Effect> {
        if self.phase == Phase::Hidden {
            return Vec::new();
        }
        self.phase = Phase::RollingBack;
        vec![Effect::Notify {
            kind: NoticeKind::Success,
            message: format!(
                "Rolling back {}: cancelled {}",
                self.plugin_id,
                version_label(package_identifier)
            ),
        }]
    }

    fn finish(&mut self, message: String) -> Vec<Effect> {
        self.phase = Phase::Hidden;
        self.polling = false;
        vec![
            Effect::Notify {
                kind: NoticeKind::Success,
                message,
            },
            Effect::Refresh,
            Effect::StopPolling,
        ]
    }
}
