pub mod chat;
pub mod doctor;
pub mod ingest;
pub mod init;
pub mod persona;
pub mod providers;
pub mod serve;

use anyhow::Context;
use hydra_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file in use: `--config` / `HYDRA_CONFIG`, else the default.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_path(path);
    AppConfig::load_with_env(&path).with_context(|| format!("Failed to load {}", path.display()))
}
