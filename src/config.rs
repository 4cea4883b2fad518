//! Application configuration management.
//!
//! Configuration is stored at `~/.config/galley/config.json` and covers the
//! account backend URL; `GALLEY_BACKEND_URL` overrides it (handy with a
//! `.env` file during development). The session itself lives under the data
//! directory, shared with the game - see `crate::auth::SessionStore`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "galley";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default account backend, matching the game's development setup
const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the configured backend URL
const BACKEND_URL_ENV: &str = "GALLEY_BACKEND_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            // Scaffold a config file the user can edit
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Backend URL with env override applied
    pub fn backend_url(&self) -> String {
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session, shared with the game client
    pub fn session_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join("session"))
    }
}
