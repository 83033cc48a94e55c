use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or editing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse run configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse settings: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unknown settings key: {0}")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Object fetcher '{program}' not found on PATH")]
    FetcherNotFound { program: String },

    #[error("Run configuration not found: {}", .0.display())]
    NotFound(PathBuf),
}
