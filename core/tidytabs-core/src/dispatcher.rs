//! Maps IDE lifecycle events onto ledger updates and eviction passes.
//!
//! [`TidyService`] is the one object a host creates per session. It owns the
//! ledger, the idle anchor and the purge lock, and feeds eviction triggers to
//! a single background worker.
//!
//! | Event | Action |
//! |---|---|
//! | window activated | touch gained (and lost) window |
//! | document opened | touch its window; stale pass if `purge_on_open` |
//! | document saved | both passes if `purge_on_save` |
//! | document closing | forget its windows |
//! | build begin, tidy command | both passes |
//! | solution opened | touch every open document window |
//! | foreground regained or lost | shift ledger by idle time, re-anchor |
//! | text edited | re-anchor idle time |
//!
//! Host failures are contained here and never reach the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tidytabs_protocol::HostEvent;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::TidySettings;
use crate::error::Result;
use crate::host::{DocumentHost, WindowHandle, WindowId};
use crate::idle::IdleCompensator;
use crate::ledger::ActivityLedger;
use crate::planner::{EvictionPlanner, PassReport};
use crate::worker::PurgeWorker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    WindowActivated {
        gained: WindowHandle,
        lost: Option<WindowHandle>,
    },
    DocumentOpened {
        path: String,
        active_window: Option<WindowHandle>,
    },
    DocumentSaved {
        path: String,
    },
    DocumentClosing {
        path: String,
        windows: Vec<WindowId>,
    },
    BuildBegin,
    TidyCommand,
    SolutionOpened,
    ForegroundRegained,
    ForegroundLost,
    TextEdited,
}

impl From<HostEvent> for TabEvent {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::WindowActivated { gained, lost } => TabEvent::WindowActivated {
                gained: gained.into(),
                lost: lost.map(Into::into),
            },
            HostEvent::DocumentOpened {
                path,
                active_window,
            } => TabEvent::DocumentOpened {
                path,
                active_window: active_window.map(Into::into),
            },
            HostEvent::DocumentSaved { path } => TabEvent::DocumentSaved { path },
            HostEvent::DocumentClosing { path, windows } => TabEvent::DocumentClosing {
                path,
                windows: windows.into_iter().map(WindowId).collect(),
            },
            HostEvent::BuildBegin => TabEvent::BuildBegin,
            HostEvent::TidyCommand => TabEvent::TidyCommand,
            HostEvent::SolutionOpened => TabEvent::SolutionOpened,
            HostEvent::ForegroundChanged { active: true } => TabEvent::ForegroundRegained,
            HostEvent::ForegroundChanged { active: false } => TabEvent::ForegroundLost,
            HostEvent::TextEdited => TabEvent::TextEdited,
        }
    }
}

/// Why a purge was requested. Decides which passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeTrigger {
    DocumentSaved,
    DocumentOpened,
    BuildBegin,
    Command,
}

impl PurgeTrigger {
    /// `None` when settings suppress this trigger, otherwise whether the
    /// oldest-first pass follows the stale pass.
    fn run_oldest_pass(self, settings: &TidySettings) -> Option<bool> {
        match self {
            PurgeTrigger::DocumentSaved if !settings.purge_on_save => None,
            PurgeTrigger::DocumentOpened if !settings.purge_on_open => None,
            PurgeTrigger::DocumentOpened => Some(false),
            PurgeTrigger::DocumentSaved | PurgeTrigger::BuildBegin | PurgeTrigger::Command => {
                Some(settings.max_open_tabs_enabled())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidyReport {
    pub trigger: PurgeTrigger,
    pub stale: PassReport,
    pub oldest: Option<PassReport>,
}

impl TidyReport {
    pub fn closed(&self) -> Vec<WindowId> {
        let mut closed = self.stale.closed.clone();
        if let Some(oldest) = &self.oldest {
            closed.extend(oldest.closed.iter().copied());
        }
        closed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TidyStats {
    pub passes_run: u64,
    pub windows_closed: u64,
    pub close_failures: u64,
}

pub(crate) struct ServiceCore {
    host: Arc<dyn DocumentHost>,
    clock: Arc<dyn Clock>,
    ledger: ActivityLedger,
    idle: IdleCompensator,
    purge_lock: Mutex<()>,
    stats: Mutex<TidyStats>,
}

impl ServiceCore {
    fn lock_purge(&self) -> MutexGuard<'_, ()> {
        self.purge_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn run_trigger(&self, trigger: PurgeTrigger) -> Option<TidyReport> {
        let _guard = self.lock_purge();
        let settings = self.host.settings();
        let Some(run_oldest) = trigger.run_oldest_pass(&settings) else {
            debug!(trigger = ?trigger, "Purge disabled for trigger");
            return None;
        };

        Some(self.run_passes(trigger, run_oldest, &settings))
    }

    fn run_now(&self) -> TidyReport {
        let _guard = self.lock_purge();
        let settings = self.host.settings();
        self.run_passes(
            PurgeTrigger::Command,
            settings.max_open_tabs_enabled(),
            &settings,
        )
    }

    /// Caller holds the purge lock.
    fn run_passes(
        &self,
        trigger: PurgeTrigger,
        run_oldest: bool,
        settings: &TidySettings,
    ) -> TidyReport {
        let planner = EvictionPlanner::new(self.host.as_ref(), &self.ledger, self.clock.as_ref());
        let stale = planner.close_stale_windows(settings);
        let oldest = run_oldest.then(|| planner.close_oldest_windows(settings));
        let report = TidyReport {
            trigger,
            stale,
            oldest,
        };

        self.record_stats(&report);
        report
    }

    fn record_stats(&self, report: &TidyReport) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        for pass in std::iter::once(&report.stale).chain(report.oldest.as_ref()) {
            stats.passes_run += 1;
            stats.windows_closed += pass.closed_count() as u64;
            stats.close_failures += pass.failed as u64;
        }
    }

    fn seed_from_host(&self) -> usize {
        let _guard = self.lock_purge();
        match self.host.list_document_windows() {
            Ok(windows) => {
                let now = self.clock.now();
                let unique: BTreeSet<WindowId> = windows.into_iter().collect();
                for id in &unique {
                    self.ledger.upsert(&WindowHandle::document(id.0), Some(now));
                }
                unique.len()
            }
            Err(err) => {
                warn!(error = %err, "Failed to seed tab activity from open windows");
                0
            }
        }
    }

    fn compensate_idle(&self) {
        let _guard = self.lock_purge();
        self.idle.compensate(&self.ledger, self.clock.now());
    }

    fn touch(&self, window: &WindowHandle) {
        self.ledger.upsert(window, Some(self.clock.now()));
    }

    fn interaction(&self) {
        self.idle.record_interaction(self.clock.now());
    }
}

pub struct TidyService {
    core: Arc<ServiceCore>,
    worker: PurgeWorker,
}

impl TidyService {
    pub fn new(host: Arc<dyn DocumentHost>, clock: Arc<dyn Clock>) -> Result<Self> {
        let core = Arc::new(ServiceCore {
            ledger: ActivityLedger::new(Arc::clone(&clock)),
            host,
            clock,
            idle: IdleCompensator::new(),
            purge_lock: Mutex::new(()),
            stats: Mutex::new(TidyStats::default()),
        });
        let worker = PurgeWorker::spawn(Arc::clone(&core))?;
        Ok(Self { core, worker })
    }

    /// Creates the service and, if a solution is already loaded, seeds the
    /// ledger from the windows that are open right now.
    pub fn start(host: Arc<dyn DocumentHost>, clock: Arc<dyn Clock>) -> Result<Self> {
        let service = Self::new(host, clock)?;
        if service.core.host.is_solution_loaded() {
            let seeded = service.core.seed_from_host();
            info!(windows = seeded, "Tidy Tabs started with open solution");
        }
        Ok(service)
    }

    pub fn handle_host_event(&self, event: HostEvent) {
        self.handle_event(event.into());
    }

    pub fn handle_event(&self, event: TabEvent) {
        let core = &self.core;
        match event {
            TabEvent::WindowActivated { gained, lost } => {
                core.interaction();
                core.touch(&gained);
                if let Some(lost) = lost {
                    core.touch(&lost);
                }
            }
            TabEvent::DocumentOpened {
                path,
                active_window,
            } => {
                core.interaction();
                if let Some(window) = active_window {
                    core.touch(&window);
                }
                debug!(path = %path, "Document opened");
                self.worker.submit(PurgeTrigger::DocumentOpened);
            }
            TabEvent::DocumentSaved { path } => {
                core.interaction();
                debug!(path = %path, "Document saved");
                self.worker.submit(PurgeTrigger::DocumentSaved);
            }
            TabEvent::DocumentClosing { path, windows } => {
                core.interaction();
                for window in windows {
                    core.ledger.remove(window);
                }
                debug!(path = %path, "Document closing");
            }
            TabEvent::BuildBegin => {
                core.interaction();
                self.worker.submit(PurgeTrigger::BuildBegin);
            }
            TabEvent::TidyCommand => {
                info!("Tidy Tabs keyboard shortcut triggered");
                self.worker.submit(PurgeTrigger::Command);
            }
            TabEvent::SolutionOpened => {
                let seeded = core.seed_from_host();
                debug!(windows = seeded, "Seeded tab activity for opened solution");
            }
            TabEvent::ForegroundRegained | TabEvent::ForegroundLost => core.compensate_idle(),
            TabEvent::TextEdited => core.interaction(),
        }
    }

    /// Runs both passes on the calling thread and returns what they did.
    ///
    /// Serialized with queued passes through the same purge lock.
    pub fn tidy_now(&self) -> TidyReport {
        self.core.run_now()
    }

    /// Waits for every previously submitted purge to finish.
    pub fn flush(&self) {
        self.worker.flush();
    }

    pub fn ledger(&self) -> &ActivityLedger {
        &self.core.ledger
    }

    pub fn last_interaction(&self) -> Option<DateTime<Utc>> {
        self.core.idle.last_interaction()
    }

    pub fn stats(&self) -> TidyStats {
        self.core
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{InMemoryHost, WindowSpec};
    use chrono::Duration;

    fn service_with(settings: TidySettings) -> (Arc<InMemoryHost>, Arc<ManualClock>, TidyService) {
        let host = Arc::new(InMemoryHost::new(settings));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = TidyService::new(host.clone(), clock.clone()).unwrap();
        (host, clock, service)
    }

    #[test]
    fn trigger_gating_follows_settings() {
        let off = TidySettings {
            purge_on_save: false,
            purge_on_open: false,
            max_open_tabs: 3,
            ..TidySettings::default()
        };
        assert_eq!(PurgeTrigger::DocumentSaved.run_oldest_pass(&off), None);
        assert_eq!(PurgeTrigger::DocumentOpened.run_oldest_pass(&off), None);
        assert_eq!(PurgeTrigger::BuildBegin.run_oldest_pass(&off), Some(true));
        assert_eq!(PurgeTrigger::Command.run_oldest_pass(&off), Some(true));

        let on = TidySettings {
            purge_on_save: true,
            purge_on_open: true,
            max_open_tabs: 0,
            ..TidySettings::default()
        };
        assert_eq!(PurgeTrigger::DocumentSaved.run_oldest_pass(&on), Some(false));
        assert_eq!(PurgeTrigger::DocumentOpened.run_oldest_pass(&on), Some(false));
    }

    #[test]
    fn activation_touches_both_windows() {
        let (_, clock, service) = service_with(TidySettings::default());
        service.handle_event(TabEvent::WindowActivated {
            gained: WindowHandle::document(1),
            lost: Some(WindowHandle::document(2)),
        });

        assert_eq!(service.ledger().last_seen(WindowId(1)), Some(clock.now()));
        assert_eq!(service.ledger().last_seen(WindowId(2)), Some(clock.now()));
        assert_eq!(service.last_interaction(), Some(clock.now()));
    }

    #[test]
    fn activation_of_tool_window_is_ignored() {
        let (_, _, service) = service_with(TidySettings::default());
        service.handle_event(TabEvent::WindowActivated {
            gained: WindowHandle::tool(5),
            lost: None,
        });
        assert!(service.ledger().is_empty());
    }

    #[test]
    fn closing_document_forgets_all_its_windows() {
        let (_, _, service) = service_with(TidySettings::default());
        for id in [1, 2, 3] {
            service.ledger().upsert(&WindowHandle::document(id), None);
        }

        service.handle_event(TabEvent::DocumentClosing {
            path: "/a.rs".to_string(),
            windows: vec![WindowId(1), WindowId(2)],
        });

        assert_eq!(service.ledger().entries().len(), 1);
        assert!(service.ledger().contains(WindowId(3)));
    }

    #[test]
    fn solution_opened_seeds_every_open_window() {
        let (host, clock, service) = service_with(TidySettings::default());
        host.open_window(WindowSpec::document(1, "/a.rs"));
        host.open_window(WindowSpec::document(2, "/b.rs"));
        host.open_window(WindowSpec::tool(3));

        service.handle_event(TabEvent::SolutionOpened);

        assert_eq!(service.ledger().len(), 2);
        assert_eq!(service.ledger().last_seen(WindowId(2)), Some(clock.now()));
    }

    #[test]
    fn text_edit_only_moves_idle_anchor() {
        let (_, clock, service) = service_with(TidySettings::default());
        service.handle_event(TabEvent::TextEdited);

        assert_eq!(service.last_interaction(), Some(clock.now()));
        assert!(service.ledger().is_empty());
    }

    #[test]
    fn foreground_regained_shifts_by_time_away() {
        let (_, clock, service) = service_with(TidySettings::default());
        let t0 = clock.now();
        service.ledger().upsert(&WindowHandle::document(1), None);
        service.handle_event(TabEvent::ForegroundLost);

        clock.advance(Duration::minutes(30));
        service.handle_event(TabEvent::ForegroundRegained);

        assert_eq!(
            service.ledger().last_seen(WindowId(1)),
            Some(t0 + Duration::minutes(30))
        );
    }

    #[test]
    fn foreground_lost_counts_time_since_last_edit() {
        let (_, clock, service) = service_with(TidySettings::default());
        let t0 = clock.now();
        service.ledger().upsert(&WindowHandle::document(1), None);
        service.handle_event(TabEvent::TextEdited);

        clock.advance(Duration::minutes(20));
        service.handle_event(TabEvent::ForegroundLost);
        assert_eq!(
            service.ledger().last_seen(WindowId(1)),
            Some(t0 + Duration::minutes(20))
        );
        assert_eq!(service.last_interaction(), Some(clock.now()));

        clock.advance(Duration::minutes(10));
        service.handle_event(TabEvent::ForegroundRegained);
        assert_eq!(
            service.ledger().last_seen(WindowId(1)),
            Some(t0 + Duration::minutes(30))
        );
    }

    #[test]
    fn stats_survive_a_poisoned_lock() {
        let settings = TidySettings {
            tab_timeout_minutes: 10,
            tab_close_threshold: 0,
            ..TidySettings::default()
        };
        let (host, clock, service) = service_with(settings);
        let handle = host.open_window(WindowSpec::document(1, "/a.rs"));
        service.ledger().upsert(&handle, Some(clock.now() - Duration::minutes(30)));
        service.tidy_now();

        let core = Arc::clone(&service.core);
        let _ = std::thread::spawn(move || {
            let _guard = core.stats.lock().unwrap();
            panic!("poison stats");
        })
        .join();

        assert_eq!(service.stats().windows_closed, 1);
    }

    #[test]
    fn tidy_now_reports_stats() {
        let settings = TidySettings {
            tab_timeout_minutes: 10,
            tab_close_threshold: 0,
            max_open_tabs: 1,
            ..TidySettings::default()
        };
        let (host, clock, service) = service_with(settings);
        for id in 1..=3 {
            let handle = host.open_window(WindowSpec::document(id, format!("/{}.rs", id)));
            service.ledger().upsert(&handle, Some(clock.now() - Duration::minutes(id as i64)));
        }
        clock.advance(Duration::minutes(10));

        let report = service.tidy_now();

        assert_eq!(report.stale.closed, vec![WindowId(3), WindowId(2), WindowId(1)]);
        assert_eq!(report.oldest.as_ref().map(|r| r.closed_count()), Some(0));
        let stats = service.stats();
        assert_eq!(stats.passes_run, 2);
        assert_eq!(stats.windows_closed, 3);
    }
}
