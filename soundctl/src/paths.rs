/// Canonical file locations for soundctl data.
///
/// Everything lives under `<config dir>\SoundCtl\` (`%APPDATA%` on Windows):
///   - config.json  Context rules for the monitor.
///   - profiles\    One `<name>.json` document per saved sound profile.
use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR_NAME: &str = "SoundCtl";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const PROFILES_DIR_NAME: &str = "profiles";

/// Returns the soundctl application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the full path to the monitor configuration file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE_NAME))
}

/// Returns the directory holding saved profiles.
pub fn profiles_dir() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(PROFILES_DIR_NAME))
}
