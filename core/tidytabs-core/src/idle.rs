//! Keeps time spent away from the IDE from counting against tab freshness.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use tracing::debug;

use crate::ledger::ActivityLedger;

#[derive(Debug, Default)]
pub struct IdleCompensator {
    last_interaction: Mutex<Option<DateTime<Utc>>>,
}

impl IdleCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_interaction(&self, at: DateTime<Utc>) {
        *self.last_interaction.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }

    pub fn last_interaction(&self) -> Option<DateTime<Utc>> {
        *self.last_interaction.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Shifts every ledger entry forward by the time since the last
    /// interaction, then re-anchors at `now`. Returns the shift applied.
    ///
    /// Callers hold the purge lock so no pass observes a half-shifted ledger.
    pub fn compensate(&self, ledger: &ActivityLedger, now: DateTime<Utc>) -> Option<Duration> {
        let mut anchor = self.last_interaction.lock().unwrap_or_else(|e| e.into_inner());
        let applied = match *anchor {
            Some(last) => {
                let idle = now.signed_duration_since(last);
                if idle > Duration::zero() {
                    ledger.shift_all(idle);
                    debug!(
                        idle_secs = idle.num_seconds(),
                        windows = ledger.len(),
                        "Shifted tab activity by idle time"
                    );
                    Some(idle)
                } else {
                    None
                }
            }
            None => None,
        };
        *anchor = Some(now);
        applied
    }
}
