use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, warn};

const CONFIG_ENV_VAR: &str = "TASKFLOW_CONFIG";
const CONFIG_FILE: &str = "taskflow.toml";

/// TOML settings file. Every field is optional; the defaults are a
/// platform data directory, UTC, color on, and due-date sorting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub timezone: Option<String>,
    pub color: Option<bool>,
    pub default_sort: Option<String>,
}

impl Config {
    #[tracing::instrument(skip(override_path))]
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match override_path {
            Some(path) => Some(path.to_path_buf()),
            None => config_file_path(),
        };

        let Some(path) = path else {
            warn!("cannot determine config path; using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(file = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(file = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn color_enabled(&self) -> bool {
        self.color.unwrap_or(true)
    }
}

/// Default config location: `TASKFLOW_CONFIG`, else
/// `<config_dir>/taskflow/taskflow.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    dirs::config_dir().map(|dir| dir.join("taskflow").join(CONFIG_FILE))
}

/// Data directory precedence: CLI override, config `data_dir`, then
/// `<data_dir>/taskflow`.
#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(path) = &cfg.data_dir {
        path.clone()
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir().context("cannot determine platform data directory")?;
    Ok(base.join("taskflow"))
}
