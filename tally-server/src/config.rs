use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::Deserialize;

/// Typed settings for the Tally server, loaded from a TOML file with
/// `TALLY__`-prefixed environment overrides on top.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Page size applied when a list request omits `limit`.
    pub page_size: usize,
    /// Hard cap on caller-supplied `limit` values.
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            page_size: 50,
            max_page_size: 500,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "data/tally.db".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    /// When set, logs additionally roll into daily files under this
    /// directory.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            directory: None,
        }
    }
}

/// Load settings. A missing file is not an error: defaults plus
/// environment overrides apply.
pub fn load(path: &Path) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if path.exists() {
        builder = builder.add_source(File::from(path.to_path_buf()));
    }
    let settings = builder
        .add_source(Environment::with_prefix("TALLY").separator("__"))
        .build()
        .context("loading configuration")?;
    settings
        .try_deserialize()
        .context("deserializing configuration")
}
