use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use self::log::LogConfig;
use self::storage::StorageConfig;
use self::translator::TranslatorConfig;

pub mod log;
pub mod storage;
pub mod translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub translator: TranslatorConfig,
    pub log: LogConfig,

    /// Upper bound on how long startup waits for persisted cells to load
    pub storage_ready_timeout_ms: u64,
    /// Maximum number of saved translations kept in history
    pub history_limit: usize,
}

impl Config {
    pub fn new() -> Self {
        let storage_ready_timeout_ms = env::var("TOLK_STORAGE_READY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000); // 2 seconds default

        let history_limit = env::var("TOLK_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Config {
            storage: StorageConfig::new(),
            translator: TranslatorConfig::new(),
            log: LogConfig::new(),

            storage_ready_timeout_ms,
            history_limit,
        }
    }

    pub fn storage_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_ready_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
