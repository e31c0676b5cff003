//! Last-seen timestamps for open document windows.
//!
//! The ledger is the sole source of truth for "when was this tab last
//! relevant". Single-entry updates come straight from the event-delivery
//! thread; multi-step work (eviction passes, solution seeding, idle
//! compensation) additionally holds the service's purge lock.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::Clock;
use crate::host::{WindowHandle, WindowId};

pub struct ActivityLedger {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<WindowId, DateTime<Utc>>>,
}

impl ActivityLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records `window` as seen at `timestamp` (default: now).
    ///
    /// Tool windows are ignored. Returns whether an entry was written.
    pub fn upsert(&self, window: &WindowHandle, timestamp: Option<DateTime<Utc>>) -> bool {
        if window.is_tool() {
            return false;
        }
        let seen = timestamp.unwrap_or_else(|| self.clock.now());
        self.lock().insert(window.id, seen);
        true
    }

    pub fn remove(&self, window: WindowId) -> Option<DateTime<Utc>> {
        self.lock().remove(&window)
    }

    pub fn last_seen(&self, window: WindowId) -> Option<DateTime<Utc>> {
        self.lock().get(&window).copied()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.lock().contains_key(&window)
    }

    /// A point-in-time copy of every `(window, last_seen)` pair.
    ///
    /// Writes that land after the copy is taken are picked up by the next call.
    pub fn entries(&self) -> Vec<(WindowId, DateTime<Utc>)> {
        self.lock().iter().map(|(id, seen)| (*id, *seen)).collect()
    }

    /// Moves every stored timestamp forward by `delta`.
    pub fn shift_all(&self, delta: Duration) {
        for seen in self.lock().values_mut() {
            *seen += delta;
        }
    }

    /// Drops entries for windows not in `live`. Returns how many were dropped.
    pub fn retain_live(&self, live: &HashSet<WindowId>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|id, _| live.contains(id));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WindowId, DateTime<Utc>>> {
        // A panic while holding the map cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ledger() -> (Arc<ManualClock>, ActivityLedger) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ledger = ActivityLedger::new(clock.clone());
        (clock, ledger)
    }

    #[test]
    fn upsert_defaults_to_now() {
        let (clock, ledger) = ledger();
        let window = WindowHandle::document(1);

        assert!(ledger.upsert(&window, None));
        assert_eq!(ledger.last_seen(window.id), Some(clock.now()));
    }

    #[test]
    fn upsert_overwrites_existing_entry() {
        let (clock, ledger) = ledger();
        let window = WindowHandle::document(1);
        let earlier = clock.now() - Duration::minutes(10);

        ledger.upsert(&window, Some(earlier));
        ledger.upsert(&window, None);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last_seen(window.id), Some(clock.now()));
    }

    #[test]
    fn tool_windows_are_never_tracked() {
        let (_, ledger) = ledger();
        assert!(!ledger.upsert(&WindowHandle::tool(9), None));
        assert!(ledger.is_empty());
    }

    #[test]
    fn remove_then_entries_has_no_trace() {
        let (_, ledger) = ledger();
        let window = WindowHandle::document(4);
        ledger.upsert(&window, None);

        assert!(ledger.remove(window.id).is_some());
        assert!(ledger.remove(window.id).is_none());
        assert!(ledger.entries().iter().all(|(id, _)| *id != window.id));
    }

    #[test]
    fn retain_live_forgets_closed_windows() {
        let (_, ledger) = ledger();
        for id in [1, 2, 3] {
            ledger.upsert(&WindowHandle::document(id), None);
        }
        let live: HashSet<_> = [WindowId(2)].into();

        assert_eq!(ledger.retain_live(&live), 2);
        assert_eq!(ledger.entries().len(), 1);
        assert!(ledger.contains(WindowId(2)));
    }

    #[test]
    fn shift_applies_to_explicit_upsert_value() {
        let (clock, ledger) = ledger();
        let a = WindowHandle::document(1);
        let b = WindowHandle::document(2);
        let t0 = clock.now();

        ledger.upsert(&a, Some(t0));
        ledger.shift_all(Duration::minutes(3));
        ledger.upsert(&b, Some(t0));
        ledger.shift_all(Duration::minutes(4));

        assert_eq!(ledger.last_seen(a.id), Some(t0 + Duration::minutes(7)));
        assert_eq!(ledger.last_seen(b.id), Some(t0 + Duration::minutes(4)));
    }

    #[test]
    fn concurrent_upserts_keep_one_record_per_window() {
        let (_, ledger) = ledger();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for id in 1..=50 {
                        ledger.upsert(&WindowHandle::document(id), None);
                        ledger.shift_all(Duration::seconds(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.len(), 50);
    }
}
