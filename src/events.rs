// Notification and refresh ports, plus the broadcast bus that feeds WebSocket clients

use tokio::sync::broadcast;

use crate::models::{NoticeKind, PanelEvent};

/// Operator-facing toast sink. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Host callback run after a panel reaches its terminal hidden state.
pub trait RefreshHook: Send + Sync {
    fn refresh(&self, plugin_id: &str);
}

/// Notifier that only logs; used when no one is listening for notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => tracing::info!(notice = "success", "{}", message),
            NoticeKind::Error => tracing::warn!(notice = "error", "{}", message),
        }
    }
}

impl RefreshHook for LogNotifier {
    fn refresh(&self, plugin_id: &str) {
        tracing::info!(plugin_id, "refresh requested");
    }
}

/// Per-panel event bus. Notices and refresh requests are logged and broadcast;
/// slow subscribers may lag and miss events.
pub struct PanelEvents {
    tx: broadcast::Sender<PanelEvent>,
}

impl PanelEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, event: PanelEvent) {
        // No receivers is normal: nobody has the panel open over WebSocket.
        let _ = self.tx.send(event);
    }
}

impl Notifier for PanelEvents {
    fn notify(&self, kind: NoticeKind, message: &str) {
        LogNotifier.notify(kind, message);
        self.publish(PanelEvent::Notice {
            kind,
            message: message.to_string(),
        });
    }
}

impl RefreshHook for PanelEvents {
    fn refresh(&self, plugin_id: &str) {
        LogNotifier.refresh(plugin_id);
        self.publish(PanelEvent::Refresh {
            plugin_id: plugin_id.to_string(),
        });
    }
}
