//! Settings and their persistence.
//!
//! The core only ever reads settings through [`DocumentHost::settings`]; this
//! module supplies the value type plus load/save helpers for hosts that keep
//! settings in `~/.tidytabs/settings.json`.
//!
//! [`DocumentHost::settings`]: crate::host::DocumentHost::settings

use chrono::Duration;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TidyError};

pub const SETTINGS_FILE: &str = "settings.json";

/// User-configurable thresholds.
///
/// Uses `#[serde(default)]` so older or partial files still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidySettings {
    /// Inactivity before a tab becomes a timeout-eviction candidate.
    pub tab_timeout_minutes: u32,
    /// Timeout eviction never leaves fewer than this many tabs open.
    /// 0 means inactive tabs are always eligible.
    pub tab_close_threshold: u32,
    /// Hard cap on open tabs, enforced oldest first. 0 disables the cap.
    pub max_open_tabs: u32,
    pub purge_on_save: bool,
    pub purge_on_open: bool,
}

impl Default for TidySettings {
    fn default() -> Self {
        Self {
            tab_timeout_minutes: 30,
            tab_close_threshold: 10,
            max_open_tabs: 0,
            purge_on_save: true,
            purge_on_open: false,
        }
    }
}

impl TidySettings {
    pub fn tab_timeout(&self) -> Duration {
        Duration::minutes(i64::from(self.tab_timeout_minutes))
    }

    pub fn max_open_tabs_enabled(&self) -> bool {
        self.max_open_tabs > 0
    }
}

/// Returns the Tidy Tabs directory (~/.tidytabs).
pub fn get_tidytabs_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tidytabs"))
}

pub fn get_settings_path() -> Option<PathBuf> {
    get_tidytabs_dir().map(|d| d.join(SETTINGS_FILE))
}

/// Loads settings, returning defaults if the file is missing or unreadable.
pub fn load_settings() -> TidySettings {
    get_settings_path()
        .and_then(|p| load_settings_from(&p).ok())
        .unwrap_or_default()
}

/// Loads settings from an explicit path.
///
/// A missing file yields defaults; a malformed one is an error so callers
/// that asked for a specific file learn about it.
pub fn load_settings_from(path: &Path) -> Result<TidySettings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(TidySettings::default())
        }
        Err(source) => {
            return Err(TidyError::Io {
                context: format!("reading {}", path.display()),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|err| TidyError::SettingsMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Saves settings to the default location.
pub fn save_settings(settings: &TidySettings) -> Result<PathBuf> {
    let path = get_settings_path().ok_or(TidyError::HomeDirNotFound)?;
    save_settings_to(&path, settings)?;
    Ok(path)
}

/// Writes settings atomically (temp file + rename).
pub fn save_settings_to(path: &Path, settings: &TidySettings) -> Result<()> {
    let write_failed = |source| TidyError::SettingsWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let payload = serde_json::to_string_pretty(settings).map_err(|source| TidyError::Json {
        context: "serializing settings".to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(write_failed)?;
    fs::rename(&tmp_path, path).map_err(write_failed)?;
    Ok(())
}
