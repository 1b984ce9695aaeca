use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_dir() -> PathBuf {
    PathBuf::from(".tolk")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one json file per persisted key
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Keep everything in memory, nothing survives the process
    #[serde(default)]
    pub ephemeral: bool,
}

impl StorageConfig {
    pub fn new() -> Self {
        let dir = env::var("TOLK_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_dir());

        let ephemeral = env::var("TOLK_EPHEMERAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        Self { dir, ephemeral }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            ephemeral: false,
        }
    }
}
