use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::{FileStore, StoreError};

/// App-group namespace shared by the report extension and the host app.
pub const DEFAULT_SUITE_NAME: &str = "group.com.data.bettr";

/// Overrides the directory holding store namespaces.
pub const STORE_DIR_ENV: &str = "BETTR_STORE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_suite_name")]
    pub suite_name: String,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

fn default_suite_name() -> String {
    DEFAULT_SUITE_NAME.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            suite_name: default_suite_name(),
            store_dir: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bettr").join("settings.json"))
    }

    /// Loads `settings.json`, falling back to defaults when it is missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(settings) => Some(settings),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed settings");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Directory holding store namespaces.
    /// Priority: BETTR_STORE_DIR env var > settings.json > platform data dir.
    pub fn store_base_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(STORE_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        self.store_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("bettr")))
            .unwrap_or_else(|| PathBuf::from(".bettr"))
    }

    /// Opens a fresh handle on the shared namespace.
    pub fn open_store(&self) -> Result<FileStore, StoreError> {
        FileStore::open_suite(&self.store_base_dir(), &self.suite_name)
    }
}
