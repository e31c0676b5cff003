//! Error types for tidytabs-core operations.

use std::path::PathBuf;

use crate::host::WindowId;

/// All errors that can occur in tidytabs-core operations.
///
/// Host failures never escape the dispatcher; they surface as
/// [`CloseOutcome::Failed`](crate::eligibility::CloseOutcome::Failed) entries
/// or as an aborted (empty) pass.
#[derive(Debug, thiserror::Error)]
pub enum TidyError {
    // ─────────────────────────────────────────────────────────────────────
    // Host Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Host call failed: {operation}: {details}")]
    HostCall {
        operation: &'static str,
        details: String,
    },

    #[error("Window not open: {0}")]
    WindowNotOpen(WindowId),

    // ─────────────────────────────────────────────────────────────────────
    // Settings Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Settings file malformed: {path}: {details}")]
    SettingsMalformed { path: PathBuf, details: String },

    #[error("Settings write failed: {path}: {source}")]
    SettingsWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TidyError {
    pub fn host(operation: &'static str, details: impl Into<String>) -> Self {
        TidyError::HostCall {
            operation,
            details: details.into(),
        }
    }
}

/// Convenience type alias for Results using TidyError.
pub type Result<T> = std::result::Result<T, TidyError>;

impl From<TidyError> for String {
    fn from(err: TidyError) -> String {
        err.to_string()
    }
}
