//! An in-process [`DocumentHost`].
//!
//! Backs the replay command and the test suites. Besides modelling open
//! windows it can inject host failures and slow down window enumeration.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use crate::config::TidySettings;
use crate::error::{Result, TidyError};
use crate::host::{DocumentHost, DocumentState, WindowHandle, WindowId, WindowState};

fn default_true() -> bool {
    true
}

/// Description of a window to open in the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WindowSpec {
    pub id: u64,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub saved: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub tool: bool,
}

impl WindowSpec {
    pub fn document(id: u64, path: impl Into<String>) -> Self {
        Self {
            id,
            path: Some(path.into()),
            saved: true,
            pinned: false,
            tool: false,
        }
    }

    /// A document window with no backing document (e.g. a designer surface).
    pub fn designer(id: u64) -> Self {
        Self {
            id,
            path: None,
            saved: true,
            pinned: false,
            tool: false,
        }
    }

    pub fn tool(id: u64) -> Self {
        Self {
            tool: true,
            ..Self::designer(id)
        }
    }

    pub fn unsaved(mut self) -> Self {
        self.saved = false;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn handle(&self) -> WindowHandle {
        if self.tool {
            WindowHandle::tool(self.id)
        } else {
            WindowHandle::document(self.id)
        }
    }
}

#[derive(Default)]
struct HostState {
    windows: BTreeMap<WindowId, WindowSpec>,
    active: Option<WindowId>,
    settings: TidySettings,
    solution_loaded: bool,
    closed: Vec<WindowId>,
    failing_close: HashSet<WindowId>,
    failing_state: HashSet<WindowId>,
    failing_listing: bool,
    duplicate_listing: bool,
    listing_delay: Option<StdDuration>,
}

#[derive(Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
    listings_in_flight: AtomicUsize,
    max_listings_in_flight: AtomicUsize,
}

impl InMemoryHost {
    pub fn new(settings: TidySettings) -> Self {
        let host = Self::default();
        host.lock().settings = settings;
        host.lock().solution_loaded = true;
        host
    }

    pub fn open_window(&self, spec: WindowSpec) -> WindowHandle {
        let handle = spec.handle();
        self.lock().windows.insert(handle.id, spec);
        handle
    }

    /// Closes a window on the user's behalf. Not recorded in [`closed`](Self::closed).
    pub fn user_close(&self, window: WindowId) -> Option<WindowSpec> {
        let mut state = self.lock();
        if state.active == Some(window) {
            state.active = None;
        }
        state.windows.remove(&window)
    }

    pub fn set_active(&self, window: Option<WindowId>) {
        self.lock().active = window;
    }

    pub fn set_saved(&self, window: WindowId, saved: bool) {
        if let Some(spec) = self.lock().windows.get_mut(&window) {
            spec.saved = saved;
        }
    }

    pub fn set_pinned(&self, window: WindowId, pinned: bool) {
        if let Some(spec) = self.lock().windows.get_mut(&window) {
            spec.pinned = pinned;
        }
    }

    pub fn set_settings(&self, settings: TidySettings) {
        self.lock().settings = settings;
    }

    pub fn set_solution_loaded(&self, loaded: bool) {
        self.lock().solution_loaded = loaded;
    }

    pub fn fail_close(&self, window: WindowId) {
        self.lock().failing_close.insert(window);
    }

    pub fn fail_state(&self, window: WindowId) {
        self.lock().failing_state.insert(window);
    }

    pub fn fail_listing(&self, failing: bool) {
        self.lock().failing_listing = failing;
    }

    /// Report every window twice, as hosts listing per view do.
    pub fn duplicate_listing(&self, duplicate: bool) {
        self.lock().duplicate_listing = duplicate;
    }

    pub fn set_listing_delay(&self, delay: Option<StdDuration>) {
        self.lock().listing_delay = delay;
    }

    /// Windows closed through [`DocumentHost::close`], in order.
    pub fn closed(&self) -> Vec<WindowId> {
        self.lock().closed.clone()
    }

    pub fn is_open(&self, window: WindowId) -> bool {
        self.lock().windows.contains_key(&window)
    }

    pub fn open_windows(&self) -> Vec<WindowSpec> {
        self.lock().windows.values().cloned().collect()
    }

    pub fn window(&self, window: WindowId) -> Option<WindowSpec> {
        self.lock().windows.get(&window).cloned()
    }

    /// Windows belonging to the document at `path`.
    pub fn windows_for_document(&self, path: &str) -> Vec<WindowId> {
        self.lock()
            .windows
            .iter()
            .filter(|(_, spec)| spec.path.as_deref() == Some(path))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Highest number of overlapping [`DocumentHost::list_document_windows`] calls seen.
    pub fn max_concurrent_listings(&self) -> usize {
        self.max_listings_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentHost for InMemoryHost {
    fn list_document_windows(&self) -> Result<Vec<WindowId>> {
        let in_flight = self.listings_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_listings_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.lock().listing_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let result = {
            let state = self.lock();
            if state.failing_listing {
                Err(TidyError::host("list_document_windows", "enumeration failed"))
            } else {
                let mut ids: Vec<WindowId> = state
                    .windows
                    .values()
                    .filter(|spec| !spec.tool)
                    .map(|spec| WindowId(spec.id))
                    .collect();
                if state.duplicate_listing {
                    let copies = ids.clone();
                    ids.extend(copies);
                }
                Ok(ids)
            }
        };

        self.listings_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn active_window(&self) -> Result<Option<WindowId>> {
        Ok(self.lock().active)
    }

    fn window_state(&self, window: WindowId) -> Result<WindowState> {
        let state = self.lock();
        if state.failing_state.contains(&window) {
            return Err(TidyError::host("window_state", format!("{} unavailable", window)));
        }
        let spec = state
            .windows
            .get(&window)
            .ok_or(TidyError::WindowNotOpen(window))?;
        Ok(WindowState {
            document: spec.path.as_ref().map(|path| DocumentState {
                path: path.clone(),
                saved: spec.saved,
            }),
        })
    }

    fn is_pinned(&self, document_path: &str) -> Result<bool> {
        Ok(self
            .lock()
            .windows
            .values()
            .any(|spec| spec.pinned && spec.path.as_deref() == Some(document_path)))
    }

    fn close(&self, window: WindowId) -> Result<()> {
        let mut state = self.lock();
        if state.failing_close.contains(&window) {
            return Err(TidyError::host("close", format!("{} refused to close", window)));
        }
        if state.windows.remove(&window).is_none() {
            return Err(TidyError::WindowNotOpen(window));
        }
        if state.active == Some(window) {
            state.active = None;
        }
        state.closed.push(window);
        Ok(())
    }

    fn settings(&self) -> TidySettings {
        self.lock().settings.clone()
    }

    fn is_solution_loaded(&self) -> bool {
        self.lock().solution_loaded
    }
}
