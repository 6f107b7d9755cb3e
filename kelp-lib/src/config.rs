use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fs::config_dir;

const FILE_NAME: &str = "kelp.toml";

pub const URL_VAR: &str = "KELP_URL";
pub const ANON_KEY_VAR: &str = "KELP_ANON_KEY";

/// Handle to the core configuration
pub type Cfg = Arc<RwLock<CoreConfig>>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to access configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Missing configuration value `{0}`")]
    Missing(&'static str),
}

/// Connection details for the hosted backend, serialized to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Base URL of the backend project, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public anonymous API key
    pub anon_key: String,
    pub profiles_table: String,
    pub avatar_bucket: String,
    /// Edge length of the avatar image, in logical pixels
    pub avatar_size: u16,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            profiles_table: "profiles".into(),
            avatar_bucket: "avatars".into(),
            avatar_size: 200,
        }
    }
}

impl CoreConfig {
    /// Load the configuration from `path`, or from the default location in the config
    /// directory. A missing file is created with default values. `KELP_URL` and
    /// `KELP_ANON_KEY` override whatever the file says.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_dir()
                .map_err(|source| Error::Io {
                    path: PathBuf::from(FILE_NAME),
                    source,
                })?
                .join(FILE_NAME),
        };

        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| Error::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            let cfg = Self::default();
            cfg.save(&path)?;
            cfg
        };

        cfg.apply_env();
        debug!("Loaded configuration from {}", path.display());

        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, contents).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Make sure everything needed to reach the backend is present.
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.trim().is_empty() {
            return Err(Error::Missing("url"));
        }
        if self.anon_key.trim().is_empty() {
            return Err(Error::Missing("anon_key"));
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var(URL_VAR) {
            self.url = url;
        }
        if let Ok(key) = env::var(ANON_KEY_VAR) {
            self.anon_key = key;
        }
    }

    /// Wrap this configuration in a shared [`Cfg`] handle.
    pub fn into_handle(self) -> Cfg {
        Arc::new(RwLock::new(self))
    }
}
