//! `tidytabs settings` subcommands.

use std::path::{Path, PathBuf};
use tidytabs_core::{
    get_settings_path, load_settings_from, save_settings_to, TidyError, TidySettings,
};

fn resolve(path: Option<&Path>) -> Result<PathBuf, TidyError> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_settings_path().ok_or(TidyError::HomeDirNotFound),
    }
}

/// Settings for commands that accept `--settings`, defaults when absent.
pub fn load(path: Option<&Path>) -> Result<TidySettings, TidyError> {
    load_settings_from(&resolve(path)?)
}

pub fn show(path: Option<&Path>) -> Result<(), TidyError> {
    let settings = load(path)?;
    let rendered = serde_json::to_string_pretty(&settings).map_err(|source| TidyError::Json {
        context: "rendering settings".to_string(),
        source,
    })?;
    println!("{}", rendered);
    Ok(())
}

pub fn print_path() -> Result<(), TidyError> {
    println!("{}", resolve(None)?.display());
    Ok(())
}

/// Writes default settings. An existing file is only replaced with `force`.
pub fn init(path: Option<&Path>, force: bool) -> Result<PathBuf, TidyError> {
    let path = resolve(path)?;
    if path.exists() && !force {
        tracing::info!(path = %path.display(), "Settings file already exists");
        return Ok(path);
    }
    save_settings_to(&path, &TidySettings::default())?;
    tracing::info!(path = %path.display(), "Wrote default settings");
    Ok(path)
}
