use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found: {0}\n\
        Searched: CLOUDSYNC_CONFIG_PATH, ./cloudsync.local.yaml, ./.cloudsync.local.yaml,\n\
        ./cloudsync.yaml, ./.cloudsync.yaml, ./.cloudsync/ and ~/.config/cloudsync/cloudsync.yaml"
    )]
    NotFound(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
