// Persistent user settings, stored as JSON under the home directory.
use super::{ConfigError, ConfigResult, DEFAULT_STAGE_FILE};
use crate::template_matching::DEFAULT_THRESHOLD;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_DIR: &str = ".adb-stage-runner";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `adb` executable used by the shell backend.
    pub adb_path: PathBuf,
    /// Device serial; `host:port` for network emulators (MuMu listens on 127.0.0.1:7555).
    pub device: Option<String>,
    pub templates_dir: PathBuf,
    pub stage_file: PathBuf,
    pub threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            adb_path: PathBuf::from("adb"),
            device: None,
            templates_dir: PathBuf::from("images"),
            stage_file: PathBuf::from(DEFAULT_STAGE_FILE),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Settings {
    /// `~/.adb-stage-runner/settings.json`
    pub fn default_path() -> ConfigResult<PathBuf> {
        let home = homedir::my_home()
            .ok()
            .flatten()
            .ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("no settings at {path:?}, using defaults");
            return Ok(Settings::default());
        }
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.threshold, 0.8);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"adb_path": "/opt/adb", "device": "127.0.0.1:7555"}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.adb_path, PathBuf::from("/opt/adb"));
        assert_eq!(settings.device.as_deref(), Some("127.0.0.1:7555"));
        assert_eq!(settings.templates_dir, PathBuf::from("images"));
    }

    #[test]
    fn save_creates_parent_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_DIR).join(SETTINGS_FILE);
        let settings = Settings {
            threshold: 0.9,
            device: Some("emulator-5554".into()),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }
}
