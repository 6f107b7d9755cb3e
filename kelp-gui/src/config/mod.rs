use std::{fs, path::Path};

use kelp_lib::fs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::theme::Theme;

mod theme;

const FILE_NAME: &str = "gui.toml";

/// Look and feel of the desktop client, serialized to TOML next to the core configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    pub theme: Theme,
}

impl GuiConfig {
    /// Load from the config directory. Problems are logged and the defaults are used
    /// instead, the client shouldn't refuse to start over a cosmetic setting.
    pub fn load() -> Self {
        match config_dir() {
            Ok(dir) => Self::load_from(&dir.join(FILE_NAME)),
            Err(err) => {
                warn!("No config directory, using default GUI settings: {err}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(path);
            return cfg;
        }

        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed {}: {err}", path.display());
                Self::default()
            }),
            Err(err) => {
                warn!("Unable to read {}: {err}", path.display());
                Self::default()
            }
        }
    }

    fn save_to(&self, path: &Path) {
        let result = toml::to_string_pretty(self)
            .map_err(|err| err.to_string())
            .and_then(|contents| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|err| err.to_string())?;
                }
                fs::write(path, contents).map_err(|err| err.to_string())
            });

        if let Err(err) = result {
            warn!("Unable to write {}: {err}", path.display());
        }
    }

    pub fn theme(&self) -> iced::Theme {
        (&self.theme).into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);

        let cfg = GuiConfig::load_from(&path);

        assert_eq!(cfg, GuiConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_load_theme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "theme = \"Nord\"\n").unwrap();

        let cfg = GuiConfig::load_from(&path);

        assert_eq!(cfg.theme, Theme::Nord);
        assert_eq!(cfg.theme(), iced::Theme::Nord);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "theme = 42\n").unwrap();

        assert_eq!(GuiConfig::load_from(&path), GuiConfig::default());
    }
}
