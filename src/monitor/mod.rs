// Monitor session: one task per mounted panel owns the rollout machine (single writer).
// Snapshots arrive from the poller, operator commands from the handle; both are applied in order.

pub mod machine;
mod panels;

pub use panels::{MonitorSettings, Panel, Panels, spawn_pruner};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{Instrument, debug, info, warn};

use crate::error::ControlError;
use crate::events::{Notifier, RefreshHook};
use crate::history::TrendHistory;
use crate::models::{ControlKind, NoticeKind, PanelView, Phase, Snapshot};
use crate::poller::{self, PollerConfig};
use crate::registry::TrafficRegistry;
use crate::render::panel_view;
use machine::{Effect, RolloutMachine};

/// Queued snapshots between poller and session; the poller waits when full.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Registry and host collaborators for a session.
pub struct SessionDeps {
    pub registry: Arc<dyn TrafficRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub refresh: Arc<dyn RefreshHook>,
}

pub struct SessionConfig {
    pub plugin_id: String,
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub evict_stale_versions: bool,
}

type Reply = oneshot::Sender<Result<PanelView, ControlError>>;

enum Command {
    Approve { reply: Reply },
    Cancel { target: Option<String>, reply: Reply },
}

/// Handle to a running session. Dropping it shuts the session down.
pub struct MonitorHandle {
    plugin_id: String,
    commands: mpsc::Sender<Command>,
    views: watch::Receiver<PanelView>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Latest rendered view. Stays readable after the session ends.
    pub fn view(&self) -> PanelView {
        self.views.borrow().clone()
    }

    /// View updates; `changed()` errors once the session has ended.
    pub fn subscribe(&self) -> watch::Receiver<PanelView> {
        self.views.clone()
    }

    /// True once the session has ended (hidden or disposed).
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn approve(&self) -> Result<PanelView, ControlError> {
        self.request(|reply| Command::Approve { reply }).await
    }

    /// Roll back `target`, or the first draining version when `None`.
    pub async fn cancel(&self, target: Option<String>) -> Result<PanelView, ControlError> {
        self.request(|reply| Command::Cancel { target, reply }).await
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<PanelView, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ControlError::PanelClosed)?;
        rx.await.map_err(|_| ControlError::PanelClosed)?
    }

    /// Stop polling and end the session; returns once the task has exited.
    pub async fn dispose(&self) {
        self.shutdown.send_replace(true);
        let mut views = self.views.clone();
        while views.changed().await.is_ok() {}
    }
}

/// Spawns the session and its poller. The session ends when the panel becomes hidden,
/// when `dispose` is called, or when the handle is dropped.
pub fn spawn(deps: SessionDeps, config: SessionConfig) -> MonitorHandle {
    let SessionConfig {
        plugin_id,
        poll_interval_ms,
        history_capacity,
        evict_stale_versions,
    } = config;

    let machine = RolloutMachine::new(plugin_id.clone(), TrendHistory::new(history_capacity))
        .with_stale_eviction(evict_stale_versions);
    let (views_tx, views) = watch::channel(panel_view(&machine, None));
    let (commands, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (enabled_tx, enabled_rx) = watch::channel(true);
    let (snapshots_tx, snapshots_rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);

    let poller = poller::spawn(
        deps.registry.clone(),
        PollerConfig {
            plugin_id: plugin_id.clone(),
            interval: Duration::from_millis(poll_interval_ms),
        },
        enabled_rx,
        snapshots_tx,
    );

    let session = Session {
        machine,
        deps,
        enabled: enabled_tx,
        views: views_tx,
        busy: None,
    };
    let span = tracing::info_span!("monitor", plugin_id = %plugin_id);
    let task = tokio::spawn(
        async move {
            // Keep the poller alive for exactly as long as the session runs.
            let _poller = poller;
            session.run(snapshots_rx, commands_rx, shutdown_rx).await;
        }
        .instrument(span),
    );

    MonitorHandle {
        plugin_id,
        commands,
        views,
        shutdown,
        task,
    }
}

struct Session {
    machine: RolloutMachine,
    deps: SessionDeps,
    enabled: watch::Sender<bool>,
    views: watch::Sender<PanelView>,
    busy: Option<ControlKind>,
}

/// Whether the session loop keeps going after a step.
enum Flow {
    Continue,
    Stop,
}

impl Session {
    async fn run(
        mut self,
        mut snapshots: mpsc::Receiver<Snapshot>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("panel mounted");
        loop {
            let flow = tokio::select! {
                biased;
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => Flow::Stop,
                Some(snapshot) = snapshots.recv() => {
                    self.on_snapshot(snapshot);
                    Flow::Continue
                }
                Some(command) = commands.recv() => self.on_command(command, &mut shutdown).await,
                else => Flow::Stop,
            };
            if matches!(flow, Flow::Stop) || self.machine.phase() == Phase::Hidden {
                break;
            }
        }
        self.enabled.send_replace(false);
        info!(phase = ?self.machine.phase(), "panel closed");
    }

    fn on_snapshot(&mut self, snapshot: Snapshot) {
        // Polling may have stopped while this snapshot sat in the queue.
        if !self.machine.polling() {
            debug!("discarding snapshot received after polling stopped");
            return;
        }
        let effects = self.machine.observe(snapshot);
        self.apply(effects);
        self.publish();
    }

    async fn on_command(&mut self, command: Command, shutdown: &mut watch::Receiver<bool>) -> Flow {
        match command {
            Command::Approve { reply } => {
                if let Err(e) = self.machine.check_approve() {
                    let _ = reply.send(Err(e));
                    return Flow::Continue;
                }
                self.set_busy(Some(ControlKind::Approve));
                let registry = self.deps.registry.clone();
                let plugin_id = self.machine.plugin_id().to_string();
                let outcome = tokio::select! {
                    result = registry.approve(&plugin_id) => result,
                    _ = shutdown.wait_for(|stop| *stop) => {
                        let _ = reply.send(Err(ControlError::PanelClosed));
                        return Flow::Stop;
                    }
                };
                let result = match outcome {
                    Ok(()) => {
                        info!(operation = "approve", "rollout approved");
                        let effects = self.machine.approved();
                        self.apply(effects);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, operation = "approve", "approve failed");
                        self.deps
                            .notifier
                            .notify(NoticeKind::Error, &format!("Approve failed: {}", e));
                        Err(ControlError::from(e))
                    }
                };
                self.set_busy(None);
                let _ = reply.send(result.map(|()| self.views.borrow().clone()));
            }
            Command::Cancel { target, reply } => {
                let package_identifier = match self.machine.cancel_target(target.as_deref()) {
                    Ok(v) => v.package_identifier.clone(),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return Flow::Continue;
                    }
                };
                self.set_busy(Some(ControlKind::Cancel));
                let registry = self.deps.registry.clone();
                let outcome = tokio::select! {
                    result = registry.cancel(&package_identifier) => result,
                    _ = shutdown.wait_for(|stop| *stop) => {
                        let _ = reply.send(Err(ControlError::PanelClosed));
                        return Flow::Stop;
                    }
                };
                let result = match outcome {
                    Ok(()) => {
                        info!(operation = "cancel", target = %package_identifier, "rollback started");
                        let effects = self.machine.cancelled(&package_identifier);
                        self.apply(effects);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, operation = "cancel", target = %package_identifier, "cancel failed");
                        self.deps
                            .notifier
                            .notify(NoticeKind::Error, &format!("Rollback failed: {}", e));
                        Err(ControlError::from(e))
                    }
                };
                self.set_busy(None);
                let _ = reply.send(result.map(|()| self.views.borrow().clone()));
            }
        }
        Flow::Continue
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify { kind, message } => self.deps.notifier.notify(kind, &message),
                Effect::Refresh => self.deps.refresh.refresh(self.machine.plugin_id()),
                Effect::StopPolling => {
                    self.enabled.send_replace(false);
                }
            }
        }
    }

    fn set_busy(&mut self, busy: Option<ControlKind>) {
        self.busy = busy;
        self.publish();
    }

    fn publish(&self) {
        self.views.send_replace(panel_view(&self.machine, self.busy));
    }
}
