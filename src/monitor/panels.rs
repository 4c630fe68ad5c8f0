// Mounted panels keyed by plugin id. Each panel owns its session and event bus;
// nothing is shared between plugin ids.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::{MonitorHandle, SessionConfig, SessionDeps, spawn};
use crate::events::PanelEvents;
use crate::registry::TrafficRegistry;

/// Per-panel settings applied at mount time.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub evict_stale_versions: bool,
    pub event_capacity: usize,
}

pub struct Panel {
    pub handle: MonitorHandle,
    pub events: Arc<PanelEvents>,
}

pub struct Panels {
    registry: Arc<dyn TrafficRegistry>,
    settings: MonitorSettings,
    panels: RwLock<HashMap<String, Arc<Panel>>>,
}

impl Panels {
    pub fn new(registry: Arc<dyn TrafficRegistry>, settings: MonitorSettings) -> Self {
        Self {
            registry,
            settings,
            panels: RwLock::new(HashMap::new()),
        }
    }

    /// Mount a panel for `plugin_id`, reusing a live one. A panel whose session has
    /// ended is replaced by a fresh mount.
    pub async fn mount(&self, plugin_id: &str) -> Arc<Panel> {
        let mut panels = self.panels.write().await;
        if let Some(panel) = panels.get(plugin_id)
            && !panel.handle.is_closed()
        {
            return panel.clone();
        }

        let events = Arc::new(PanelEvents::new(self.settings.event_capacity));
        let handle = spawn(
            SessionDeps {
                registry: self.registry.clone(),
                notifier: events.clone(),
                refresh: events.clone(),
            },
            SessionConfig {
                plugin_id: plugin_id.to_string(),
                poll_interval_ms: self.settings.poll_interval_ms,
                history_capacity: self.settings.history_capacity,
                evict_stale_versions: self.settings.evict_stale_versions,
            },
        );
        info!(plugin_id, "panel mounted");
        let panel = Arc::new(Panel { handle, events });
        panels.insert(plugin_id.to_string(), panel.clone());
        panel
    }

    /// The panel for `plugin_id`, including one that has just closed so its final
    /// view can still be read. Closed panels are dropped on the next `prune`.
    pub async fn get(&self, plugin_id: &str) -> Option<Arc<Panel>> {
        self.panels.read().await.get(plugin_id).cloned()
    }

    /// Dispose a panel. Returns false when nothing was mounted.
    pub async fn dispose(&self, plugin_id: &str) -> bool {
        let panel = self.panels.write().await.remove(plugin_id);
        match panel {
            Some(panel) => {
                panel.handle.dispose().await;
                info!(plugin_id, "panel disposed");
                true
            }
            None => false,
        }
    }

    /// Drop panels whose sessions have ended; returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut panels = self.panels.write().await;
        let before = panels.len();
        panels.retain(|_, panel| !panel.handle.is_closed());
        before - panels.len()
    }

    /// Mounted plugin ids, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.panels.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn dispose_all(&self) {
        let drained: Vec<(String, Arc<Panel>)> = self.panels.write().await.drain().collect();
        for (plugin_id, panel) in drained {
            panel.handle.dispose().await;
            tracing::debug!(plugin_id, "panel disposed");
        }
    }
}

/// Periodically drops closed panels until `shutdown_rx` fires.
pub fn spawn_pruner(
    panels: Arc<Panels>,
    every: std::time::Duration,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let removed = panels.prune().await;
                    if removed > 0 {
                        tracing::debug!(removed, "pruned closed panels");
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }
    })
}
