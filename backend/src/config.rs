use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::models::Settings;

const SETTINGS_FILE: &str = "settings.json";

/// Default location of the settings file, next to the executable.
pub fn default_settings_path() -> Result<PathBuf> {
    let exe = env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or(anyhow!("executable has no parent directory"))?;

    Ok(dir.join(SETTINGS_FILE))
}

/// Loads [`Settings`] from `path`.
///
/// A missing file yields the default settings, which are then written to `path`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        let settings = Settings::default();
        info!(target: "config", "{} not found, writing defaults", path.display());
        save_settings(path, &settings)?;
        return Ok(settings);
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    settings_from_json(&json)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write settings to {}", path.display()))
}

fn settings_from_json(json: &str) -> Result<Settings> {
    Ok(serde_json::from_str(json)?)
}
