use std::error::Error;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories_next::BaseDirs;
use serde::{Deserialize, Serialize};

pub const SETTINGS_VERSION: &str = "1";
const SETTINGS_FILE_NAME: &str = "midiviz_settings.json";

pub const DEFAULT_WINDOW_SIZE: [u32; 2] = [1280, 600];
pub const DEFAULT_WINDOW_POSITION: [i32; 2] = [100, 100];

/// Startup values remembered between runs.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub version: String,
    pub window_size: [u32; 2],
    pub window_position: [i32; 2],
    pub gui_scale: f32,
    pub prevent_transparency: bool,
    pub last_midi_path: Option<PathBuf>,
    pub last_config_path: Option<PathBuf>,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            window_position: DEFAULT_WINDOW_POSITION,
            gui_scale: 1.0,
            prevent_transparency: false,
            last_midi_path: None,
            last_config_path: None,
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("MidiViz"))
}

/// Location of the persisted settings, falling back to the working dir.
pub fn settings_path() -> PathBuf {
    config_dir()
        .map(|dir| dir.join(SETTINGS_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
}

pub fn save_settings(
    path: &Path,
    settings: &PersistedSettings,
) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(settings)?;
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    fs::write(path, json)?;
    Ok(())
}

pub fn load_settings(path: &Path) -> Result<PersistedSettings, Box<dyn Error>> {
    let json = fs::read_to_string(path)?;
    let settings = serde_json::from_str::<PersistedSettings>(&json)?;
    Ok(settings)
}

pub fn load_settings_if_exists(
    path: &Path,
) -> Result<Option<PersistedSettings>, Box<dyn Error>> {
    match load_settings(path) {
        Ok(settings) => Ok(Some(settings)),
        Err(err) => {
            if err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|e| e.kind() == ErrorKind::NotFound)
            {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}
