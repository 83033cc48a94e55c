//! Errors surfaced by the terraprep commands

use terraprep_config::ConfigError;
use terraprep_manifest::ManifestError;

/// Failure of a command; the binary prints it and exits with status 1
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Manifest(ManifestError),
    Io(anyhow::Error),
    InvalidArgs(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "Configuration error: {}", e),
            RunError::Manifest(e) => write!(f, "Resolution error: {}", e),
            RunError::Io(e) => write!(f, "{:#}", e),
            RunError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<ManifestError> for RunError {
    fn from(e: ManifestError) -> Self {
        RunError::Manifest(e)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        RunError::Io(e)
    }
}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        RunError::Io(e.into())
    }
}
