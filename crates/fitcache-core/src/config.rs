//! Application configuration management.
//!
//! Holds the backend URLs, the document collection, cache sizing and the
//! last signed-in user. Stored at `~/.config/fitcache/config.json`; a few
//! fields can be overridden from the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::versioned::DEFAULT_CACHE_CAPACITY;
use crate::remote::http::DEFAULT_POLL_INTERVAL;
use crate::remote::USERS_COLLECTION;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fitcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cache subdirectory used before anyone has signed in
const ANONYMOUS_DIR: &str = "anonymous";

const ENV_REMOTE_URL: &str = "FITCACHE_REMOTE_URL";
const ENV_API_URL: &str = "FITCACHE_API_URL";
const ENV_DEMO: &str = "FITCACHE_DEMO";

const DEFAULT_REMOTE_URL: &str = "http://localhost:8080";
const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store base URL
    pub remote_base_url: String,
    /// Backend base URL for plan generation
    pub api_base_url: String,
    pub collection: String,
    /// Show the sample document to anonymous sessions
    pub demo_mode: bool,
    pub cache_capacity: usize,
    /// How often the HTTP store polls for pushes
    pub poll_interval_secs: u64,
    pub last_user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_base_url: DEFAULT_REMOTE_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            collection: USERS_COLLECTION.to_string(),
            demo_mode: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            last_user_id: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from `lookup` (the process environment in `load`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_REMOTE_URL).filter(|v| !v.is_empty()) {
            self.remote_base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(demo) = lookup(ENV_DEMO) {
            self.demo_mode = matches!(demo.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root of the cache directory, shared by all users.
    pub fn cache_root() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Per-user cache directory holding the session and the local mirror.
    pub fn cache_dir(&self, user_id: Option<&str>) -> Result<PathBuf> {
        let user = user_id
            .or(self.last_user_id.as_deref())
            .unwrap_or(ANONYMOUS_DIR);
        Ok(Self::cache_root()?.join(user))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
