//! Subcommands and the helpers they share.

pub mod batch;
pub mod captcha;
pub mod config;
pub mod ingest;
pub mod serve;
pub mod user;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use billscan_core::{BillscanConfig, JsonlStore, Pipeline};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("billscan")
        .join("config.json")
}

/// Resolve the config file in use: an explicit path, else the default one.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration and apply environment overrides.
///
/// An explicit path must exist; the default path falls back to defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<BillscanConfig> {
    let config = match config_path {
        Some(path) => BillscanConfig::from_file(Path::new(path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Loading config from {}", path.display());
                BillscanConfig::from_file(&path)?
            } else {
                BillscanConfig::default()
            }
        }
    };
    Ok(config.with_env_overrides())
}

/// Open the JSON-lines store under the configured data directory.
pub async fn open_store(config: &BillscanConfig) -> anyhow::Result<Arc<JsonlStore>> {
    Ok(Arc::new(JsonlStore::open(&config.storage.data_dir).await?))
}

/// Build a pipeline backed by the configured services and the local store.
pub async fn open_pipeline(config: &BillscanConfig) -> anyhow::Result<(Pipeline, Arc<JsonlStore>)> {
    let store = open_store(config).await?;
    let pipeline = Pipeline::from_config(config, store.clone())?;
    Ok((pipeline, store))
}
