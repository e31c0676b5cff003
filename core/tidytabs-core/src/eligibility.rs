//! Which windows may be closed right now, and the close attempt itself.

use std::fmt;
use tracing::{debug, warn};

use crate::error::{Result, TidyError};
use crate::host::{DocumentHost, WindowId};
use crate::ledger::ActivityLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    Active,
    Unsaved,
    Pinned,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Ineligible::Active => "active",
            Ineligible::Unsaved => "unsaved",
            Ineligible::Pinned => "pinned",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Closable,
    Blocked(Ineligible),
}

#[derive(Debug)]
pub enum CloseOutcome {
    Closed,
    Skipped(Ineligible),
    /// State could not be resolved or the close call failed. The ledger
    /// entry has been dropped either way.
    Failed(TidyError),
}

impl CloseOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, CloseOutcome::Closed)
    }
}

/// Decides whether `window` may be closed given the current active window.
///
/// Save and pin state are queried live: a pin can be toggled without any
/// lifecycle event firing.
pub fn check_closable(
    host: &dyn DocumentHost,
    window: WindowId,
    active: Option<WindowId>,
) -> Result<Verdict> {
    if active == Some(window) {
        return Ok(Verdict::Blocked(Ineligible::Active));
    }

    let state = host.window_state(window)?;
    let Some(document) = state.document else {
        return Ok(Verdict::Closable);
    };

    if !document.saved {
        return Ok(Verdict::Blocked(Ineligible::Unsaved));
    }
    if host.is_pinned(&document.path)? {
        return Ok(Verdict::Blocked(Ineligible::Pinned));
    }
    Ok(Verdict::Closable)
}

/// Closes `window` if it is eligible.
///
/// The ledger entry is removed before the host close call, and also on any
/// failure, so a window the host cannot reason about stops being tracked.
pub fn attempt_close(
    host: &dyn DocumentHost,
    ledger: &ActivityLedger,
    window: WindowId,
) -> CloseOutcome {
    let verdict = host
        .active_window()
        .and_then(|active| check_closable(host, window, active));

    match verdict {
        Ok(Verdict::Closable) => {
            ledger.remove(window);
            match host.close(window) {
                Ok(()) => {
                    debug!(window = %window, "Closed document window");
                    CloseOutcome::Closed
                }
                Err(err) => {
                    warn!(window = %window, error = %err, "Failed to close document window");
                    CloseOutcome::Failed(err)
                }
            }
        }
        Ok(Verdict::Blocked(reason)) => {
            debug!(window = %window, reason = %reason, "Window not eligible for closing");
            CloseOutcome::Skipped(reason)
        }
        Err(err) => {
            ledger.remove(window);
            warn!(window = %window, error = %err, "Failed to resolve window state");
            CloseOutcome::Failed(err)
        }
    }
}
