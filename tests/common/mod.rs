// Shared test helpers: scripted registry, recording notifier, snapshot builders
#![allow(dead_code)]

use async_trait::async_trait;
use rollout_monitor::error::RegistryError;
use rollout_monitor::events::{Notifier, RefreshHook};
use rollout_monitor::models::*;
use rollout_monitor::registry::TrafficRegistry;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const PLUGIN: &str = "auth";
pub const OLD: &str = "acme/auth:1.0.0@aaaa";
pub const OLDER: &str = "acme/auth:0.9.0@cccc";
pub const NEW: &str = "acme/auth:2.0.0@bbbb";

pub fn snapshot(active: bool, mode: RolloutMode, draining: &[(&str, u64)]) -> Snapshot {
    let draining_versions: Vec<VersionDetail> = draining
        .iter()
        .map(|(id, count)| VersionDetail::new(*id, *count))
        .collect();
    let active_version = VersionDetail::new(NEW, 7);
    Snapshot {
        plugin_id: PLUGIN.into(),
        total_connections: active_version.connection_count
            + draining_versions
                .iter()
                .map(|v| v.connection_count)
                .sum::<u64>(),
        blue_green_active: active,
        mode,
        active_version: Some(active_version),
        draining_versions,
    }
}

pub fn idle_snapshot() -> Snapshot {
    Snapshot {
        plugin_id: PLUGIN.into(),
        total_connections: 7,
        blue_green_active: false,
        mode: RolloutMode::Auto,
        active_version: Some(VersionDetail::new(NEW, 7)),
        draining_versions: vec![],
    }
}

/// One scripted answer to `fetch_snapshot`.
pub enum Fetch {
    Snapshot(Snapshot),
    Empty,
    Fail,
}

/// In-memory registry. Scripted fetches are served in order; once the script is
/// exhausted the last snapshot served is repeated.
#[derive(Default)]
pub struct ScriptedRegistry {
    script: Mutex<VecDeque<Fetch>>,
    last: Mutex<Option<Snapshot>>,
    fetch_delay: Mutex<Option<Duration>>,
    pub fetches: AtomicUsize,
    pub approvals: Mutex<Vec<String>>,
    pub cancels: Mutex<Vec<String>>,
    pub fail_commands: AtomicBool,
}

impl ScriptedRegistry {
    pub fn new(script: Vec<Fetch>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn serving(snapshots: Vec<Snapshot>) -> Self {
        Self::new(snapshots.into_iter().map(Fetch::Snapshot).collect())
    }

    pub fn push(&self, fetch: Fetch) {
        self.script.lock().unwrap().push_back(fetch);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn approvals(&self) -> Vec<String> {
        self.approvals.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }

    fn command_result(&self) -> Result<(), RegistryError> {
        if self.fail_commands.load(Ordering::SeqCst) {
            Err(RegistryError::Status {
                status: 500,
                body: "registry exploded".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TrafficRegistry for ScriptedRegistry {
    async fn fetch_snapshot(&self, _plugin_id: &str) -> Result<SnapshotList, RegistryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Fetch::Snapshot(s)) => {
                *self.last.lock().unwrap() = Some(s.clone());
                Ok(SnapshotList { list: vec![s] })
            }
            Some(Fetch::Empty) => Ok(SnapshotList::default()),
            Some(Fetch::Fail) => Err(RegistryError::Unavailable("scripted failure".into())),
            None => Ok(SnapshotList {
                list: self.last.lock().unwrap().clone().into_iter().collect(),
            }),
        }
    }

    async fn approve(&self, plugin_id: &str) -> Result<(), RegistryError> {
        self.command_result()?;
        self.approvals.lock().unwrap().push(plugin_id.to_string());
        Ok(())
    }

    async fn cancel(&self, package_identifier: &str) -> Result<(), RegistryError> {
        self.command_result()?;
        self.cancels
            .lock()
            .unwrap()
            .push(package_identifier.to_string());
        Ok(())
    }
}

/// Records notices and refresh calls.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeKind, String)>>,
    refreshes: AtomicUsize,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

impl RefreshHook for RecordingNotifier {
    fn refresh(&self, _plugin_id: &str) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}
