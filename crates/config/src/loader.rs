use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::Settings};

/// Settings file name.
const SETTINGS_FILENAME: &str = "settings.json";

/// Process-wide config dir override (set by `--config-dir` / `HIKARI_CONFIG_DIR`).
static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the config directory for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Clear the config directory override (used by tests).
pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = None;
    }
}

/// The per-user config directory (`~/.config/hikari` on Linux), honoring
/// any override set via [`set_config_dir`].
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(guard) = CONFIG_DIR_OVERRIDE.read() {
        if let Some(ref dir) = *guard {
            return Some(dir.clone());
        }
    }
    directories::ProjectDirs::from("", "", "hikari").map(|d| d.config_dir().to_path_buf())
}

/// Load settings from the given path.
pub fn load_settings(path: &Path) -> Result<Settings, std::io::Error> {
    let raw = std::fs::read_to_string(path)?;
    let raw = substitute_env(&raw);
    serde_json::from_str(&raw).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to parse {}: {e}", path.display()),
        )
    })
}

/// Discover and load settings from standard locations.
///
/// Search order:
/// 1. `./settings.json` (project-local)
/// 2. `<config dir>/settings.json` (user-global)
///
/// Returns `Settings::default()` if no settings file is found or parsing
/// fails (parse failures are logged, never fatal).
pub fn discover_and_load() -> Settings {
    if let Some(path) = find_settings_file() {
        debug!(path = %path.display(), "loading settings");
        match load_settings(&path) {
            Ok(settings) => return settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load settings, using defaults");
            }
        }
    } else {
        debug!("no settings file found, using defaults");
    }
    Settings::default()
}

/// Returns the path of an existing settings file, or the default user-global path.
pub fn find_or_default_settings_path() -> PathBuf {
    if let Some(path) = find_settings_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILENAME)
}

/// Serialize settings to pretty JSON and write them to `path`, creating
/// parent directories as needed.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "saved settings");
    Ok(())
}

fn find_settings_file() -> Option<PathBuf> {
    // Project-local
    let local = PathBuf::from(SETTINGS_FILENAME);
    if local.exists() {
        return Some(local);
    }

    // User-global
    if let Some(dir) = config_dir() {
        let p = dir.join(SETTINGS_FILENAME);
        if p.exists() {
            return Some(p);
        }
    }
    None
}
