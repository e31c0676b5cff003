//! Host lifecycle event types for the Tidy Tabs eviction engine.
//!
//! This crate is shared by the core and any host bridge to prevent schema drift.
//! The core remains the authority on what an event means, but bridges can reuse
//! the same types to construct valid events.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A window as named by the host. `tool` marks non-document panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRef {
    pub id: u64,
    #[serde(default)]
    pub tool: bool,
}

impl WindowRef {
    pub fn document(id: u64) -> Self {
        Self { id, tool: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    WindowActivated {
        gained: WindowRef,
        #[serde(default)]
        lost: Option<WindowRef>,
    },
    DocumentOpened {
        path: String,
        #[serde(default)]
        active_window: Option<WindowRef>,
    },
    DocumentSaved {
        path: String,
    },
    DocumentClosing {
        path: String,
        #[serde(default)]
        windows: Vec<u64>,
    },
    BuildBegin,
    TidyCommand,
    SolutionOpened,
    ForegroundChanged {
        active: bool,
    },
    TextEdited,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::WindowActivated { .. } => "window_activated",
            HostEvent::DocumentOpened { .. } => "document_opened",
            HostEvent::DocumentSaved { .. } => "document_saved",
            HostEvent::DocumentClosing { .. } => "document_closing",
            HostEvent::BuildBegin => "build_begin",
            HostEvent::TidyCommand => "tidy_command",
            HostEvent::SolutionOpened => "solution_opened",
            HostEvent::ForegroundChanged { .. } => "foreground_changed",
            HostEvent::TextEdited => "text_edited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub recorded_at: String,
    pub event: HostEvent,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "recorded_at must be RFC3339",
            ));
        }

        match &self.event {
            HostEvent::WindowActivated { gained, lost } => {
                require_window(gained.id, "gained")?;
                if let Some(lost) = lost {
                    require_window(lost.id, "lost")?;
                    if lost.id == gained.id {
                        return Err(ErrorInfo::new(
                            "invalid_window",
                            "gained and lost must be different windows",
                        ));
                    }
                }
            }
            HostEvent::DocumentOpened {
                path,
                active_window,
            } => {
                require_path(path)?;
                if let Some(window) = active_window {
                    require_window(window.id, "active_window")?;
                }
            }
            HostEvent::DocumentSaved { path } => require_path(path)?,
            HostEvent::DocumentClosing { path, windows } => {
                require_path(path)?;
                for id in windows {
                    require_window(*id, "windows")?;
                }
            }
            HostEvent::BuildBegin
            | HostEvent::TidyCommand
            | HostEvent::SolutionOpened
            | HostEvent::ForegroundChanged { .. }
            | HostEvent::TextEdited => {}
        }

        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<EventEnvelope, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

fn require_path(path: &str) -> Result<(), ErrorInfo> {
    if path.trim().is_empty() {
        return Err(ErrorInfo::new("missing_field", "path is required"));
    }
    Ok(())
}

fn require_window(id: u64, field: &str) -> Result<(), ErrorInfo> {
    if id == 0 {
        return Err(ErrorInfo::new(
            "invalid_window",
            format!("{} must be a non-zero window id", field),
        ));
    }
    Ok(())
}
