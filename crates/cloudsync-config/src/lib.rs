pub mod error;

pub use error::*;

use cloudsync_core::SyncLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "CLOUDSYNC_CONFIG_PATH";
const CANDIDATES: [&str; 4] = [
    "cloudsync.local.yaml",
    ".cloudsync.local.yaml",
    "cloudsync.yaml",
    ".cloudsync.yaml",
];

/// Top level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: SyncLimits,
    pub log: LogConfig,
    /// Directory holding the state file and its lock
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: SyncLimits::default(),
            log: LogConfig::default(),
            state_dir: PathBuf::from(".cloudsync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.limits
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log.filter must not be empty".into()));
        }
        if self.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("state_dir must not be empty".into()));
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self> {
        // an empty file is the default configuration
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }
}

/// cloudsync's global config directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cloudsync");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the config file.
///
/// Search order:
/// 1. `CLOUDSYNC_CONFIG_PATH`
/// 2. current directory: cloudsync.local.yaml, .cloudsync.local.yaml,
///    cloudsync.yaml, .cloudsync.yaml
/// 3. the same names under `./.cloudsync/`
/// 4. `~/.config/cloudsync/cloudsync.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_ENV);
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let local_dir = current_dir.join(".cloudsync");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cloudsync").join("cloudsync.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Load from the discovered file, or defaults when there is none
pub fn load() -> Result<Config> {
    match find_config_file()? {
        Some(path) => load_from(&path),
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load an explicit file; unlike [`load`], a missing file is an error
pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Io(e),
    })?;
    let config = Config::from_yaml(path, &content)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
