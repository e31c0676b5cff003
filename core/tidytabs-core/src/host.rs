//! The capability interface between the eviction engine and the IDE.
//!
//! The core never talks to an automation object model directly. Everything it
//! needs from the host (enumerating document windows, resolving save and pin
//! state, closing a window, reading settings) goes through [`DocumentHost`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tidytabs_protocol::WindowRef;

use crate::config::TidySettings;
use crate::error::Result;

/// Stable identity of a host window for as long as the window stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Document,
    /// Output panes, explorers and other panels. Never tracked.
    Tool,
}

/// A window as delivered with a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle {
    pub id: WindowId,
    pub kind: WindowKind,
}

impl WindowHandle {
    pub fn document(id: u64) -> Self {
        Self {
            id: WindowId(id),
            kind: WindowKind::Document,
        }
    }

    pub fn tool(id: u64) -> Self {
        Self {
            id: WindowId(id),
            kind: WindowKind::Tool,
        }
    }

    pub fn is_tool(&self) -> bool {
        self.kind == WindowKind::Tool
    }
}

impl From<WindowRef> for WindowHandle {
    fn from(window: WindowRef) -> Self {
        if window.tool {
            WindowHandle::tool(window.id)
        } else {
            WindowHandle::document(window.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    pub path: String,
    pub saved: bool,
}

/// Live state of a window, resolved at the moment a close is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    /// `None` for surfaces with no backing document (designers and the like).
    pub document: Option<DocumentState>,
}

/// Everything the eviction engine needs from the IDE.
///
/// Implementations are called from the background purge worker as well as
/// the event-delivery thread, hence `Send + Sync`.
pub trait DocumentHost: Send + Sync {
    /// Currently open document windows. Order is irrelevant and duplicates
    /// are allowed; callers deduplicate by identity.
    fn list_document_windows(&self) -> Result<Vec<WindowId>>;

    /// The focused window, if any.
    fn active_window(&self) -> Result<Option<WindowId>>;

    fn window_state(&self, window: WindowId) -> Result<WindowState>;

    /// Whether the document's tab is pinned in the document well.
    ///
    /// Returns `Ok(false)` when the document is not open. `Err` is reserved
    /// for genuine host failures.
    fn is_pinned(&self, document_path: &str) -> Result<bool>;

    fn close(&self, window: WindowId) -> Result<()>;

    /// Settings as currently configured by the user. Read at the start of
    /// every pass, never cached by the core.
    fn settings(&self) -> TidySettings;

    /// Whether a solution is already loaded, used to seed tracking at startup.
    fn is_solution_loaded(&self) -> bool {
        true
    }
}
