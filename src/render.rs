// Presentation adapter: turns machine state into a PanelView and a plain-text panel

use std::fmt::Write;

use crate::models::{
    ControlKind, Controls, ModeBadge, PanelView, RolloutMode, VersionDetail, VersionRow,
};
use crate::monitor::machine::RolloutMachine;
use crate::sparkline::sparkline;
use crate::version::version_label;

fn version_row(machine: &RolloutMachine, version: &VersionDetail) -> VersionRow {
    let history = machine.history().get(&version.package_identifier);
    VersionRow {
        label: version_label(&version.package_identifier).to_string(),
        package_identifier: version.package_identifier.clone(),
        connections: version.connection_count,
        sparkline: sparkline(&history),
        history,
    }
}

/// View of the panel as it should be rendered now. Rows are filled only while visible.
pub fn panel_view(machine: &RolloutMachine, busy: Option<ControlKind>) -> PanelView {
    let visible = machine.is_visible();
    let snapshot = machine.snapshot().filter(|_| visible);
    let mode = snapshot.map(|s| s.mode).unwrap_or_default();

    let controls = snapshot
        .filter(|s| s.mode == RolloutMode::Manual)
        .map(|s| Controls {
            approve_enabled: busy.is_none() && machine.approve_enabled(),
            cancel_targets: s
                .draining_versions
                .iter()
                .map(|v| v.package_identifier.clone())
                .collect(),
        });

    PanelView {
        plugin_id: machine.plugin_id().to_string(),
        visible,
        phase: machine.phase(),
        polling: machine.polling(),
        total_connections: snapshot.map_or(0, |s| s.total_connections),
        badge: ModeBadge::for_state(mode, machine.phase()),
        active: snapshot
            .and_then(|s| s.active_version.as_ref())
            .map(|v| version_row(machine, v)),
        draining: snapshot
            .map(|s| {
                s.draining_versions
                    .iter()
                    .map(|v| version_row(machine, v))
                    .collect()
            })
            .unwrap_or_default(),
        controls,
        busy,
    }
}

/// Plain-text panel: header, one line per version, then the manual controls.
pub fn render_text(view: &PanelView) -> String {
    let mut out = String::new();
    if !view.visible {
        let _ = writeln!(out, "{}: no rollout in progress", view.plugin_id);
        return out;
    }
    let _ = writeln!(
        out,
        "{} [{}] {} connections",
        view.plugin_id,
        view.badge.as_str(),
        view.total_connections
    );
    if let Some(active) = &view.active {
        let _ = writeln!(out, "  active   {}", row_line(active));
    }
    for row in &view.draining {
        let _ = writeln!(out, "  draining {}", row_line(row));
    }
    if let Some(controls) = &view.controls {
        let approve = if controls.approve_enabled {
            "enabled"
        } else {
            "disabled"
        };
        let _ = writeln!(out, "  approve: {}", approve);
        if let Some(target) = controls.cancel_targets.first() {
            let _ = writeln!(out, "  cancel: {}", version_label(target));
        }
    }
    out
}

fn row_line(row: &VersionRow) -> String {
    format!("{:<12} {:>6} {}", row.label, row.connections, row.sparkline)
}
