// Snapshot poller: one cancellable fetch loop per mounted panel.
// Fetches are serialized (one in flight) on a fixed interval while `enabled` is true.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{Instrument, debug, warn};

use crate::models::Snapshot;
use crate::registry::TrafficRegistry;

/// Default fetch cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub struct PollerConfig {
    pub plugin_id: String,
    pub interval: Duration,
}

/// Owns the poll task; dropping the handle aborts it, including any fetch in flight.
pub struct PollerHandle {
    task: JoinHandle<()>,
    latest: watch::Receiver<Option<Snapshot>>,
}

impl PollerHandle {
    /// Most recent accepted snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.latest.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the poll loop. Accepted snapshots go to `out` in arrival order.
/// The loop exits when `enabled`'s sender or `out`'s receiver is dropped.
pub fn spawn(
    registry: Arc<dyn TrafficRegistry>,
    config: PollerConfig,
    enabled: watch::Receiver<bool>,
    out: mpsc::Sender<Snapshot>,
) -> PollerHandle {
    let (latest_tx, latest) = watch::channel(None);
    let span = tracing::debug_span!("poller", plugin_id = %config.plugin_id);
    let task = tokio::spawn(run(registry, config, enabled, out, latest_tx).instrument(span));
    PollerHandle { task, latest }
}

async fn run(
    registry: Arc<dyn TrafficRegistry>,
    config: PollerConfig,
    mut enabled: watch::Receiver<bool>,
    out: mpsc::Sender<Snapshot>,
    latest: watch::Sender<Option<Snapshot>>,
) {
    let PollerConfig {
        plugin_id,
        interval: period,
    } = config;
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if !*enabled.borrow_and_update() {
            debug!("polling paused");
            if enabled.changed().await.is_err() {
                break;
            }
            if *enabled.borrow() {
                debug!("polling resumed");
                tick.reset_immediately();
            }
            continue;
        }

        tokio::select! {
            _ = tick.tick() => {}
            changed = enabled.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let result = registry.fetch_snapshot(&plugin_id).await;

        // Disabled while the request was in flight: the answer is stale.
        if !*enabled.borrow() {
            debug!(operation = "fetch_snapshot", "discarding response received after polling stopped");
            continue;
        }

        match result {
            Ok(list) => match list.into_first() {
                Some(snapshot) if snapshot.plugin_id == plugin_id => {
                    latest.send_replace(Some(snapshot.clone()));
                    if out.send(snapshot).await.is_err() {
                        break;
                    }
                }
                Some(snapshot) => {
                    warn!(
                        operation = "fetch_snapshot",
                        received = %snapshot.plugin_id,
                        "discarding snapshot for a different plugin"
                    );
                }
                None => {
                    debug!(operation = "fetch_snapshot", "registry returned an empty snapshot list");
                }
            },
            Err(e) => {
                warn!(
                    error = %e,
                    operation = "fetch_snapshot",
                    "snapshot fetch failed; retrying next tick"
                );
            }
        }
    }
    debug!("poller shutting down");
}
