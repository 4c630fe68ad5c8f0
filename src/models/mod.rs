// Domain models: registry snapshots, rendered views, panel events

mod event;
mod snapshot;
mod view;

pub use event::{NoticeKind, PanelEvent};
pub use snapshot::{RolloutMode, Snapshot, SnapshotList, VersionDetail};
pub use view::{ControlKind, Controls, ModeBadge, PanelView, Phase, VersionRow};
