//! Config file parsing for `~/.config/comic-talker/config.toml`.
//!
//! The host owns presentation of settings; this module only defines the file
//! shape: shared cache/HTTP sections plus one free-form table per talker id
//! (`[talkers.mangadex]`), which each talker deserializes into its own
//! settings struct.

use std::collections::HashMap;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::cache::RecordCache;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-talker settings tables, keyed by talker id.
    #[serde(default)]
    pub talkers: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: Option<String>,
    pub ttl_hours: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: None,
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

/// Load config from the default path. Missing or unreadable config is the
/// default config.
pub fn load_config() -> AppConfig {
    let config_path = match config_path() {
        Some(p) => p,
        None => return AppConfig::default(),
    };

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed config file");
            AppConfig::default()
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("comic-talker");
        p.push("config.toml");
        p
    })
}

/// Build the record cache from config; `None` when caching is disabled or no
/// cache directory can be determined.
pub fn cache_from_config(cfg: &CacheConfig, version: &str) -> Option<RecordCache> {
    if !cfg.enabled {
        return None;
    }
    let root = match &cfg.dir {
        Some(dir) => std::path::PathBuf::from(dir),
        None => {
            let mut p = dirs::cache_dir()?;
            p.push("comic-talker");
            p
        }
    };
    let mut cache = RecordCache::new(root, version);
    if let Some(hours) = cfg.ttl_hours {
        cache = cache.with_ttl(Duration::from_secs(hours * 60 * 60));
    }
    Some(cache)
}

/// Deserialize the `[talkers.<id>]` table into a talker's settings struct.
/// An absent or malformed table yields the defaults.
pub fn talker_settings<T: DeserializeOwned + Default>(cfg: &AppConfig, talker_id: &str) -> T {
    match cfg.talkers.get(talker_id) {
        Some(value) => match value.clone().try_into() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(talker = talker_id, error = %e, "ignoring malformed talker settings");
                T::default()
            }
        },
        None => T::default(),
    }
}
