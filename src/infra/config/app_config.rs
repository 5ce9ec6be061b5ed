use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use vecbench_app::config::{CacheSettings, PoolSettings, QuerySettings, ReaperSettings};

pub const CONFIG_FILE_NAME: &str = "vecbench.toml";
pub const CONFIG_PATH_ENV: &str = "VECBENCH_CONFIG";
const ENV_PREFIX: &str = "VECBENCH_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Session store file; the user config directory when unset.
    pub path: Option<PathBuf>,
}

/// Every section is optional, so an empty or absent file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolSettings,
    pub cache: CacheSettings,
    pub reaper: ReaperSettings,
    pub query: QuerySettings,
    pub store: StoreSettings,
}

impl AppConfig {
    /// Reads the config file (explicit path, then `VECBENCH_CONFIG`, then
    /// `./vecbench.toml`, then the user config directory) and applies
    /// `VECBENCH_*` environment overrides on top.
    ///
    /// An explicitly named file must exist; the fallbacks are skipped when
    /// absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env(env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies recognised `VECBENCH_*` variables; others are ignored.
    pub fn apply_env(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "MAX_CONNECTIONS" => self.pool.max_connections = parse_env(&name, &value)?,
                "MIN_CONNECTIONS" => self.pool.min_connections = parse_env(&name, &value)?,
                "ACQUIRE_TIMEOUT_SECS" => {
                    self.pool.acquire_timeout_secs = parse_env(&name, &value)?;
                }
                "STATEMENT_TIMEOUT_MS" => {
                    self.pool.statement_timeout_ms = parse_env(&name, &value)?;
                }
                "APPLICATION_NAME" => self.pool.application_name = value,
                "REAPER_INTERVAL_SECS" => self.reaper.interval_secs = parse_env(&name, &value)?,
                "IDLE_THRESHOLD_SECS" => {
                    self.reaper.idle_threshold_secs = parse_env(&name, &value)?;
                }
                "MAX_LIMIT" => self.query.max_limit = parse_env(&name, &value)?,
                "TENANT_COLUMN" => self.query.tenant_column = value,
                "STORE_PATH" => self.store.path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("vecbench").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}
