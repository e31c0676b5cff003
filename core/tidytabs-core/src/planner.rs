//! Eviction passes over the activity ledger.
//!
//! Two passes, always run in this order inside the purge lock:
//!
//! 1. **Stale** ([`EvictionPlanner::close_stale_windows`]): windows idle longer
//!    than the timeout, oldest first, while keeping at least
//!    `tab_close_threshold` tabs open.
//! 2. **Oldest** ([`EvictionPlanner::close_oldest_windows`]): global LRU trim
//!    down to `max_open_tabs`, ignoring the timeout.
//!
//! Only windows that are both tracked and currently open are considered.
//! Ledger entries for windows the host no longer lists are dropped when a
//! pass starts.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::TidySettings;
use crate::eligibility::{attempt_close, CloseOutcome};
use crate::host::{DocumentHost, WindowId};
use crate::ledger::ActivityLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Stale,
    Oldest,
}

/// What a single pass did. `closed` is exact and in closing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub kind: PassKind,
    /// Timeout minutes for the stale pass, tab cap for the oldest pass.
    pub threshold: u32,
    pub closed: Vec<WindowId>,
    pub skipped: usize,
    pub failed: usize,
    /// False when the host could not enumerate windows and nothing was tried.
    pub completed: bool,
}

impl PassReport {
    fn new(kind: PassKind, threshold: u32) -> Self {
        Self {
            kind,
            threshold,
            closed: Vec::new(),
            skipped: 0,
            failed: 0,
            completed: true,
        }
    }

    fn aborted(kind: PassKind, threshold: u32) -> Self {
        Self {
            completed: false,
            ..Self::new(kind, threshold)
        }
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    fn record(&mut self, window: WindowId, outcome: &CloseOutcome) {
        match outcome {
            CloseOutcome::Closed => self.closed.push(window),
            CloseOutcome::Skipped(_) => self.skipped += 1,
            CloseOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Tracked, live windows idle longer than `timeout`, oldest first.
pub fn stale_candidates(
    entries: &[(WindowId, DateTime<Utc>)],
    live: &HashSet<WindowId>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Vec<WindowId> {
    let mut stale: Vec<(WindowId, Duration)> = entries
        .iter()
        .filter(|(id, _)| live.contains(id))
        .map(|(id, seen)| (*id, now.signed_duration_since(*seen)))
        .filter(|(_, age)| *age > timeout)
        .collect();
    stale.sort_by(|(a_id, a_age), (b_id, b_age)| b_age.cmp(a_age).then(a_id.cmp(b_id)));
    stale.into_iter().map(|(id, _)| id).collect()
}

/// Every tracked window ordered by last-seen time, oldest first.
pub fn oldest_first(entries: &[(WindowId, DateTime<Utc>)]) -> Vec<WindowId> {
    let mut ordered = entries.to_vec();
    ordered.sort_by(|(a_id, a_seen), (b_id, b_seen)| a_seen.cmp(b_seen).then(a_id.cmp(b_id)));
    ordered.into_iter().map(|(id, _)| id).collect()
}

/// Upper bound on windows the stale pass may close.
pub fn stale_budget(live_count: usize, tab_close_threshold: u32) -> usize {
    live_count.saturating_sub(tab_close_threshold as usize)
}

pub struct EvictionPlanner<'a> {
    host: &'a dyn DocumentHost,
    ledger: &'a ActivityLedger,
    clock: &'a dyn Clock,
}

impl<'a> EvictionPlanner<'a> {
    pub fn new(host: &'a dyn DocumentHost, ledger: &'a ActivityLedger, clock: &'a dyn Clock) -> Self {
        Self {
            host,
            ledger,
            clock,
        }
    }

    /// Open document windows, one entry per window. Forgets ledger entries
    /// for windows that were closed without a closing event.
    fn live_windows(&self) -> Option<HashSet<WindowId>> {
        match self.host.list_document_windows() {
            Ok(windows) => {
                let live: HashSet<WindowId> = windows.into_iter().collect();
                let dropped = self.ledger.retain_live(&live);
                if dropped > 0 {
                    debug!(dropped, "Forgot tabs that are no longer open");
                }
                Some(live)
            }
            Err(err) => {
                warn!(error = %err, "Failed to enumerate document windows");
                None
            }
        }
    }

    pub fn close_stale_windows(&self, settings: &TidySettings) -> PassReport {
        let Some(live) = self.live_windows() else {
            return PassReport::aborted(PassKind::Stale, settings.tab_timeout_minutes);
        };
        let mut report = PassReport::new(PassKind::Stale, settings.tab_timeout_minutes);

        let candidates = stale_candidates(
            &self.ledger.entries(),
            &live,
            self.clock.now(),
            settings.tab_timeout(),
        );
        let budget = stale_budget(live.len(), settings.tab_close_threshold);

        for window in candidates {
            if report.closed_count() >= budget {
                break;
            }
            let outcome = attempt_close(self.host, self.ledger, window);
            report.record(window, &outcome);
        }

        if report.closed_count() > 0 {
            info!(
                closed = report.closed_count(),
                timeout_minutes = settings.tab_timeout_minutes,
                "Closed {} tabs that were inactive for longer than {} minutes",
                report.closed_count(),
                settings.tab_timeout_minutes
            );
        }
        report
    }

    pub fn close_oldest_windows(&self, settings: &TidySettings) -> PassReport {
        let max_open = settings.max_open_tabs;
        if !settings.max_open_tabs_enabled() {
            return PassReport::new(PassKind::Oldest, max_open);
        }
        let Some(live) = self.live_windows() else {
            return PassReport::aborted(PassKind::Oldest, max_open);
        };
        let mut report = PassReport::new(PassKind::Oldest, max_open);

        let mut open_count = live.len();
        for window in oldest_first(&self.ledger.entries()) {
            if open_count <= max_open as usize {
                break;
            }
            if !live.contains(&window) {
                continue;
            }
            let outcome = attempt_close(self.host, self.ledger, window);
            if outcome.is_closed() {
                open_count -= 1;
            }
            report.record(window, &outcome);
        }

        if report.closed_count() > 0 {
            info!(
                closed = report.closed_count(),
                max_open_tabs = max_open,
                "Closed {} tabs to maintain a max open document count of {}",
                report.closed_count(),
                max_open
            );
        }
        report
    }
}
