// Session scenarios: completion detection, first-observation guard, guarded controls, disposal

mod common;

use common::*;
use rollout_monitor::error::ControlError;
use rollout_monitor::events::{Notifier, RefreshHook};
use rollout_monitor::models::{ModeBadge, NoticeKind, Phase, RolloutMode};
use rollout_monitor::monitor::{self, MonitorHandle, SessionConfig, SessionDeps};
use rollout_monitor::registry::TrafficRegistry;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

const POLL_MS: u64 = 2000;

fn poll() -> Duration {
    Duration::from_millis(POLL_MS)
}

/// Let the current tick's fetch and evaluation finish.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

fn mount(registry: &Arc<ScriptedRegistry>, notifier: &Arc<RecordingNotifier>) -> MonitorHandle {
    let dyn_registry: Arc<dyn TrafficRegistry> = registry.clone();
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let dyn_refresh: Arc<dyn RefreshHook> = notifier.clone();
    monitor::spawn(
        SessionDeps {
            registry: dyn_registry,
            notifier: dyn_notifier,
            refresh: dyn_refresh,
        },
        SessionConfig {
            plugin_id: PLUGIN.into(),
            poll_interval_ms: POLL_MS,
            history_capacity: 18,
            evict_stale_versions: false,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn natural_completion_notifies_exactly_once() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![
        snapshot(true, RolloutMode::Auto, &[(OLD, 5)]),
        snapshot(true, RolloutMode::Auto, &[(OLD, 0)]),
        idle_snapshot(),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);

    settle().await;
    let view = handle.view();
    assert_eq!(view.phase, Phase::Monitoring);
    assert!(view.visible);
    assert!(notifier.notices().is_empty());

    sleep(poll()).await;
    assert!(notifier.notices().is_empty());
    assert_eq!(handle.view().draining[0].history, vec![5, 0]);

    sleep(poll()).await;
    assert_eq!(notifier.count(NoticeKind::Success), 1);
    assert_eq!(notifier.refreshes(), 1);
    let view = handle.view();
    assert_eq!(view.phase, Phase::Hidden);
    assert!(!view.polling);
    assert!(!view.visible);

    sleep(poll() * 5).await;
    assert_eq!(registry.fetch_count(), 3);
    assert_eq!(notifier.notices().len(), 1);
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn first_observation_never_completes() {
    // Mounting after the rollout already finished: inactive from the first snapshot on.
    let registry = Arc::new(ScriptedRegistry::serving(vec![idle_snapshot(), idle_snapshot()]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);

    settle().await;
    sleep(poll() * 3).await;
    let view = handle.view();
    assert_eq!(view.phase, Phase::FirstObservation);
    assert!(!view.visible);
    assert!(view.polling);
    assert!(notifier.notices().is_empty());
    assert_eq!(notifier.refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn mid_rollout_mount_then_completion() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![
        snapshot(true, RolloutMode::Auto, &[(OLD, 0)]),
        idle_snapshot(),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);

    settle().await;
    assert!(notifier.notices().is_empty());
    sleep(poll()).await;
    assert_eq!(notifier.count(NoticeKind::Success), 1);
    assert_eq!(handle.view().phase, Phase::Hidden);
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_failures_change_nothing() {
    let registry = Arc::new(ScriptedRegistry::new(vec![
        Fetch::Snapshot(snapshot(true, RolloutMode::Auto, &[(OLD, 4)])),
        Fetch::Fail,
        Fetch::Fail,
        Fetch::Snapshot(snapshot(true, RolloutMode::Auto, &[(OLD, 2)])),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);

    settle().await;
    sleep(poll() * 2).await;
    let view = handle.view();
    assert_eq!(view.phase, Phase::Monitoring);
    assert_eq!(view.draining[0].history, vec![4]);
    assert!(notifier.notices().is_empty());

    sleep(poll()).await;
    assert_eq!(handle.view().draining[0].history, vec![4, 2]);
}

#[tokio::test(start_paused = true)]
async fn approve_is_guarded_by_live_draining_connections() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 3), (OLDER, 0)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    let view = handle.view();
    assert!(!view.controls.as_ref().unwrap().approve_enabled);
    let err = handle.approve().await.unwrap_err();
    assert!(matches!(
        err,
        ControlError::ConnectionsStillDraining { live: 1 }
    ));
    assert!(registry.approvals().is_empty());
    assert_eq!(handle.view().phase, Phase::Monitoring);
}

#[tokio::test(start_paused = true)]
async fn approve_is_only_offered_in_manual_mode() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Auto,
        &[(OLD, 0)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    assert!(handle.view().controls.is_none());
    assert!(matches!(
        handle.approve().await,
        Err(ControlError::NotManual { .. })
    ));
    assert!(matches!(
        handle.cancel(None).await,
        Err(ControlError::NotManual { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn approve_success_hides_and_stops_polling() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 0)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;
    assert!(handle.view().controls.unwrap().approve_enabled);

    let view = handle.approve().await.expect("approve");
    assert_eq!(view.phase, Phase::Hidden);
    assert!(!view.polling);
    assert_eq!(registry.approvals(), vec![PLUGIN.to_string()]);
    assert_eq!(notifier.count(NoticeKind::Success), 1);
    assert_eq!(notifier.refreshes(), 1);

    let fetches = registry.fetch_count();
    sleep(poll() * 5).await;
    assert_eq!(registry.fetch_count(), fetches);
    assert!(matches!(
        handle.approve().await,
        Err(ControlError::PanelClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn approve_failure_leaves_state_unchanged() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 0)],
    )]));
    registry
        .fail_commands
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    let err = handle.approve().await.unwrap_err();
    assert!(matches!(err, ControlError::Registry(_)));
    let view = handle.view();
    assert_eq!(view.phase, Phase::Monitoring);
    assert!(view.polling);
    assert!(view.busy.is_none());
    assert_eq!(notifier.count(NoticeKind::Error), 1);
    assert_eq!(notifier.refreshes(), 0);

    let fetches = registry.fetch_count();
    sleep(poll()).await;
    assert!(registry.fetch_count() > fetches);
}

#[tokio::test(start_paused = true)]
async fn cancel_starts_rollback_and_keeps_polling() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 6)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    let view = handle.cancel(None).await.expect("cancel");
    assert_eq!(view.phase, Phase::RollingBack);
    assert!(view.polling);
    assert_eq!(view.badge, ModeBadge::Rollback);
    assert_eq!(registry.cancels(), vec![OLD.to_string()]);
    assert_eq!(notifier.count(NoticeKind::Success), 1);

    let fetches = registry.fetch_count();
    sleep(poll()).await;
    assert!(registry.fetch_count() > fetches);
    assert_eq!(handle.view().badge, ModeBadge::Rollback);
}

#[tokio::test(start_paused = true)]
async fn cancel_targets_named_draining_version() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 6), (OLDER, 1)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    assert!(matches!(
        handle.cancel(Some(NEW.to_string())).await,
        Err(ControlError::UnknownTarget(_))
    ));
    handle
        .cancel(Some(OLDER.to_string()))
        .await
        .expect("cancel older");
    assert_eq!(registry.cancels(), vec![OLDER.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn cancel_failure_keeps_monitoring() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Manual,
        &[(OLD, 6)],
    )]));
    registry
        .fail_commands
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    assert!(matches!(
        handle.cancel(None).await,
        Err(ControlError::Registry(_))
    ));
    assert_eq!(handle.view().phase, Phase::Monitoring);
    assert_eq!(handle.view().badge, ModeBadge::Manual);
    assert_eq!(notifier.count(NoticeKind::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_polling() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Auto,
        &[(OLD, 6)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    handle.dispose().await;
    settle().await;
    assert!(handle.is_closed());
    let fetches = registry.fetch_count();
    sleep(poll() * 5).await;
    assert_eq!(registry.fetch_count(), fetches);
    assert!(notifier.notices().is_empty());
    assert!(matches!(
        handle.cancel(None).await,
        Err(ControlError::PanelClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_cancels_polling() {
    let registry = Arc::new(ScriptedRegistry::serving(vec![snapshot(
        true,
        RolloutMode::Auto,
        &[(OLD, 6)],
    )]));
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = mount(&registry, &notifier);
    settle().await;

    drop(handle);
    settle().await;
    let fetches = registry.fetch_count();
    sleep(poll() * 5).await;
    assert_eq!(registry.fetch_count(), fetches);
}
