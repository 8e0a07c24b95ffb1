//! Engine configuration: round cap, collaborator budgets, cache and session
//! retention sizing, and the reward table. Loaded from YAML; a missing or unreadable file yields defaults.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::{check_max_rounds, DEFAULT_MAX_ROUNDS};
use crate::report::RewardTable;
use crate::session::store::DEFAULT_SESSION_RETENTION;

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";
pub const DEFAULT_CATALOG_PATH: &str = "data/catalog.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

pub const CONFIG_PATH_ENV: &str = "BIOCLASH_CONFIG";
pub const BIND_ENV: &str = "BIOCLASH_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_rounds: u32,
    pub narrative_timeout_ms: u64,
    pub history_page_size_max: u32,
    pub report_cache_capacity: usize,
    pub report_cache_ttl_secs: u64,
    pub session_retention: usize,
    pub catalog_path: String,
    pub rewards: RewardTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            narrative_timeout_ms: 1500,
            history_page_size_max: 100,
            report_cache_capacity: 256,
            report_cache_ttl_secs: 300,
            session_retention: DEFAULT_SESSION_RETENTION,
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            rewards: RewardTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn narrative_timeout(&self) -> Duration {
        Duration::from_millis(self.narrative_timeout_ms)
    }

    pub fn report_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.report_cache_ttl_secs)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Rejects a round cap outside `[1, MAX_ROUNDS_LIMIT]`.
    pub fn validate(&self) -> crate::error::Result<()> {
        check_max_rounds(self.max_rounds).map(|_| ())
    }

    /// Config path from `BIOCLASH_CONFIG`, else [DEFAULT_CONFIG_PATH].
    pub fn load_default() -> Self {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        load_config(&path)
    }
}

/// Load config from a YAML file. Returns defaults if the file is missing or invalid.
pub fn load_config(path: &str) -> EngineConfig {
    let path = Path::new(path);
    if !path.exists() {
        return EngineConfig::default();
    }
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
            return EngineConfig::default();
        }
    };
    let config = match EngineConfig::from_yaml(&raw) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config invalid, using defaults");
            return EngineConfig::default();
        }
    };
    match config.validate() {
        Ok(()) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "config rejected, using defaults");
            EngineConfig::default()
        }
    }
}

pub fn bind_addr() -> String {
    env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}
