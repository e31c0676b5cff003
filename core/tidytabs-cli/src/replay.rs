//! Replays a recorded IDE session against the in-memory host.
//!
//! A scenario lists the windows open at the start and a timeline of entries,
//! each stamped with `recorded_at`. The manual clock jumps to every stamp
//! before the entry is applied, and queued purges are flushed afterwards so
//! each closed window can be attributed to the entry that caused it.

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tidytabs_core::{
    InMemoryHost, ManualClock, TabEvent, TidyError, TidyService, TidySettings, TidyStats,
    WindowId, WindowSpec,
};
use tidytabs_protocol::{ErrorInfo, EventEnvelope, HostEvent};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read scenario {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scenario is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Timeline entry {index}: {info}")]
    InvalidEvent { index: usize, info: ErrorInfo },

    #[error("Timeline entry {index}: timestamp {value} is not RFC3339")]
    BadTimestamp { index: usize, value: String },

    #[error("Timeline entry {index} goes back in time ({value})")]
    OutOfOrder { index: usize, value: String },

    #[error(transparent)]
    Core(#[from] TidyError),
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub settings: Option<TidySettings>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
    #[serde(default)]
    pub active: Option<u64>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    Event(EventEnvelope),
    Host {
        recorded_at: String,
        change: HostChange,
    },
    Tidy {
        recorded_at: String,
    },
}

impl TimelineEntry {
    fn recorded_at(&self) -> &str {
        match self {
            TimelineEntry::Event(envelope) => &envelope.recorded_at,
            TimelineEntry::Host { recorded_at, .. } | TimelineEntry::Tidy { recorded_at } => {
                recorded_at
            }
        }
    }
}

/// Changes made on the IDE side that no lifecycle event reports.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostChange {
    Open { window: WindowSpec },
    Close { id: u64 },
    Activate { id: Option<u64> },
    SetSaved { id: u64, saved: bool },
    SetPinned { id: u64, pinned: bool },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClosedWindow {
    pub id: u64,
    pub path: Option<String>,
    pub closed_at: String,
}

#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    pub closed: Vec<ClosedWindow>,
    pub open: Vec<u64>,
    pub stats: TidyStats,
}

pub fn load_scenario(path: &Path) -> Result<Scenario, ReplayError> {
    let content = fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_time(index: usize, value: &str) -> Result<DateTime<Utc>, ReplayError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ReplayError::BadTimestamp {
            index,
            value: value.to_string(),
        })
}

pub fn run_scenario(
    scenario: Scenario,
    fallback_settings: TidySettings,
) -> Result<ReplayOutcome, ReplayError> {
    let start = match (&scenario.started_at, scenario.timeline.first()) {
        (Some(started_at), _) => parse_time(0, started_at)?,
        (None, Some(first)) => parse_time(0, first.recorded_at())?,
        (None, None) => Utc::now(),
    };

    let host = Arc::new(InMemoryHost::new(
        scenario.settings.unwrap_or(fallback_settings),
    ));
    for window in scenario.windows {
        host.open_window(window);
    }
    host.set_active(scenario.active.map(WindowId));

    let clock = Arc::new(ManualClock::new(start));
    let service = TidyService::start(host.clone(), clock.clone())?;

    let mut closed = Vec::new();
    let mut now = start;
    for (index, entry) in scenario.timeline.into_iter().enumerate() {
        let at = parse_time(index, entry.recorded_at())?;
        if at < now {
            return Err(ReplayError::OutOfOrder {
                index,
                value: entry.recorded_at().to_string(),
            });
        }
        now = at;
        clock.set(at);

        let before = host.closed().len();
        let paths: Vec<(WindowId, Option<String>)> = host
            .open_windows()
            .into_iter()
            .map(|spec| (WindowId(spec.id), spec.path))
            .collect();

        match entry {
            TimelineEntry::Event(envelope) => {
                envelope
                    .validate()
                    .map_err(|info| ReplayError::InvalidEvent { index, info })?;
                apply_event(&host, &service, envelope.event);
            }
            TimelineEntry::Host { change, .. } => apply_change(&host, change),
            TimelineEntry::Tidy { .. } => {
                service.tidy_now();
            }
        }
        service.flush();

        for id in host.closed().into_iter().skip(before) {
            let path = paths
                .iter()
                .find(|(open_id, _)| *open_id == id)
                .and_then(|(_, path)| path.clone());
            closed.push(ClosedWindow {
                id: id.0,
                path,
                closed_at: at.to_rfc3339(),
            });
        }
    }

    Ok(ReplayOutcome {
        closed,
        open: host.open_windows().iter().map(|spec| spec.id).collect(),
        stats: service.stats(),
    })
}

/// Mirrors what the IDE itself does around each event, then dispatches it.
fn apply_event(host: &InMemoryHost, service: &TidyService, event: HostEvent) {
    debug!(event = event.name(), "Replaying host event");
    match &event {
        HostEvent::WindowActivated { gained, .. } => {
            host.set_active(Some(WindowId(gained.id)));
        }
        HostEvent::DocumentOpened {
            path,
            active_window: Some(window),
        } => {
            if !host.is_open(WindowId(window.id)) {
                host.open_window(WindowSpec {
                    tool: window.tool,
                    ..WindowSpec::document(window.id, path.clone())
                });
            }
            host.set_active(Some(WindowId(window.id)));
        }
        HostEvent::DocumentSaved { path } => {
            for id in host.windows_for_document(path) {
                host.set_saved(id, true);
            }
        }
        _ => {}
    }

    let closing = match &event {
        HostEvent::DocumentClosing { windows, .. } => windows.clone(),
        _ => Vec::new(),
    };
    service.handle_event(TabEvent::from(event));
    for id in closing {
        host.user_close(WindowId(id));
    }
}

fn apply_change(host: &InMemoryHost, change: HostChange) {
    match change {
        HostChange::Open { window } => {
            host.open_window(window);
        }
        HostChange::Close { id } => {
            host.user_close(WindowId(id));
        }
        HostChange::Activate { id } => host.set_active(id.map(WindowId)),
        HostChange::SetSaved { id, saved } => host.set_saved(WindowId(id), saved),
        HostChange::SetPinned { id, pinned } => host.set_pinned(WindowId(id), pinned),
    }
}

pub fn run(path: &Path, fallback_settings: TidySettings, json: bool) -> Result<(), ReplayError> {
    let scenario = load_scenario(path)?;
    let outcome = run_scenario(scenario, fallback_settings)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.closed.is_empty() {
        println!("No tabs closed");
    }
    for window in &outcome.closed {
        println!(
            "{}  closed #{} {}",
            window.closed_at,
            window.id,
            window.path.as_deref().unwrap_or("(no document)")
        );
    }
    let open: Vec<String> = outcome.open.iter().map(|id| format!("#{}", id)).collect();
    println!("Open: {}", open.join(" "));
    println!(
        "Passes: {}  closed: {}  failures: {}",
        outcome.stats.passes_run, outcome.stats.windows_closed, outcome.stats.close_failures
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(value: serde_json::Value) -> Scenario {
        serde_json::from_value(value).expect("scenario")
    }

    #[test]
    fn stale_tabs_close_on_build() {
        let outcome = run_scenario(
            scenario(json!({
                "settings": { "tab_timeout_minutes": 8, "tab_close_threshold": 1 },
                "windows": [
                    { "id": 1, "path": "/repo/a.rs" },
                    { "id": 2, "path": "/repo/b.rs" },
                    { "id": 3, "path": "/repo/c.rs" }
                ],
                "timeline": [
                    { "kind": "event", "recorded_at": "2026-03-01T09:00:00Z",
                      "event": { "type": "window_activated", "gained": { "id": 1 } } },
                    { "kind": "event", "recorded_at": "2026-03-01T09:05:00Z",
                      "event": { "type": "window_activated", "gained": { "id": 2 }, "lost": { "id": 1 } } },
                    { "kind": "event", "recorded_at": "2026-03-01T09:10:00Z",
                      "event": { "type": "window_activated", "gained": { "id": 3 }, "lost": { "id": 2 } } },
                    { "kind": "host", "recorded_at": "2026-03-01T09:14:00Z",
                      "change": { "op": "activate", "id": null } },
                    { "kind": "event", "recorded_at": "2026-03-01T09:14:00Z",
                      "event": { "type": "build_begin" } }
                ]
            })),
            TidySettings::default(),
        )
        .unwrap();

        let closed: Vec<u64> = outcome.closed.iter().map(|w| w.id).collect();
        assert_eq!(closed, vec![1]);
        assert_eq!(outcome.closed[0].path.as_deref(), Some("/repo/a.rs"));
        assert_eq!(outcome.open, vec![2, 3]);
    }

    #[test]
    fn document_closing_removes_window_from_host() {
        let outcome = run_scenario(
            scenario(json!({
                "windows": [{ "id": 4, "path": "/repo/d.rs" }],
                "timeline": [
                    { "kind": "event", "recorded_at": "2026-03-01T09:00:00Z",
                      "event": { "type": "document_closing", "path": "/repo/d.rs", "windows": [4] } },
                    { "kind": "tidy", "recorded_at": "2026-03-01T09:01:00Z" }
                ]
            })),
            TidySettings::default(),
        )
        .unwrap();

        assert!(outcome.closed.is_empty());
        assert!(outcome.open.is_empty());
        assert_eq!(outcome.stats.passes_run, 1);
    }

    #[test]
    fn timeline_must_move_forward() {
        let err = run_scenario(
            scenario(json!({
                "timeline": [
                    { "kind": "tidy", "recorded_at": "2026-03-01T09:10:00Z" },
                    { "kind": "tidy", "recorded_at": "2026-03-01T09:00:00Z" }
                ]
            })),
            TidySettings::default(),
        )
        .unwrap_err();

        assert!(matches!(err, ReplayError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn invalid_event_is_rejected() {
        let err = run_scenario(
            scenario(json!({
                "timeline": [
                    { "kind": "event", "recorded_at": "2026-03-01T09:00:00Z",
                      "event": { "type": "document_saved", "path": "" } }
                ]
            })),
            TidySettings::default(),
        )
        .unwrap_err();

        assert!(matches!(err, ReplayError::InvalidEvent { index: 0, .. }));
    }

    #[test]
    fn load_scenario_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, r#"{"windows": [{"id": 1}]}"#).unwrap();

        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.windows, vec![WindowSpec::designer(1)]);
    }
}
