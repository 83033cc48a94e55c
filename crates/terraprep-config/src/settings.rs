use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable that overrides the settings file location.
pub const CONFIG_ENV: &str = "TERRAPREP_CONFIG";

const POINTER_FILE: &str = ".terraprep_config_path";
const DEFAULT_DATA_DIR: &str = "data";

/// Keys accepted by [`Settings::get`] and [`Settings::set`].
pub const SETTINGS_KEYS: &[&str] = &["fetcher", "fetcher-path", "no-clobber", "data-dir"];

/// Command family used to fetch remote objects.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// `gsutil -q -m cp -r`
    #[default]
    Gsutil,
    /// `gcloud storage cp -r`
    Gcloud,
}

impl FetcherKind {
    /// Executable looked up on PATH when no explicit path is configured.
    pub fn program(self) -> &'static str {
        match self {
            FetcherKind::Gsutil => "gsutil",
            FetcherKind::Gcloud => "gcloud",
        }
    }
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for FetcherKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsutil" => Ok(FetcherKind::Gsutil),
            "gcloud" => Ok(FetcherKind::Gcloud),
            other => Err(ConfigError::InvalidValue {
                key: "fetcher".to_string(),
                value: other.to_string(),
                reason: "expected 'gsutil' or 'gcloud'".to_string(),
            }),
        }
    }
}

/// Persistent user settings
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<FetcherKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetcher_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_clobber: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

impl Settings {
    /// Location of the settings file.
    ///
    /// Resolution order: `TERRAPREP_CONFIG`, then a pointer file next to the
    /// default location, then `~/.config/terraprep/terraprep.toml`.
    pub fn path() -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        let default = Self::default_path();

        if let Ok(contents) = fs::read_to_string(Self::pointer_path()) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        default
    }

    /// Default settings path, ignoring overrides.
    pub fn default_path() -> PathBuf {
        config_dir().join("terraprep.toml")
    }

    /// File that redirects the settings location when present.
    pub fn pointer_path() -> PathBuf {
        config_dir().join(POINTER_FILE)
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Settings::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "fetcher" => self.fetcher.map(|f| f.to_string()),
            "fetcher-path" => self.fetcher_path.clone(),
            "no-clobber" => self.no_clobber.map(|b| b.to_string()),
            "data-dir" => self.data_dir.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "fetcher" => self.fetcher = Some(value.parse()?),
            "fetcher-path" => self.fetcher_path = Some(value.to_string()),
            "no-clobber" => {
                let parsed = value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "expected 'true' or 'false'".to_string(),
                })?;
                self.no_clobber = Some(parsed);
            }
            "data-dir" => self.data_dir = Some(value.to_string()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fetcher.is_none()
            && self.fetcher_path.is_none()
            && self.no_clobber.is_none()
            && self.data_dir.is_none()
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        SETTINGS_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    pub fn fetcher_kind(&self) -> FetcherKind {
        self.fetcher.unwrap_or_default()
    }

    pub fn no_clobber(&self) -> bool {
        self.no_clobber.unwrap_or(false)
    }

    /// Name of the data directory created under the run's base directory.
    pub fn data_dir_name(&self) -> &str {
        self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR)
    }

    /// Locate the fetcher executable: the configured path wins, otherwise PATH.
    pub fn fetcher_program(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.fetcher_path {
            return Ok(PathBuf::from(path));
        }
        let program = self.fetcher_kind().program();
        which::which(program).map_err(|_| ConfigError::FetcherNotFound {
            program: program.to_string(),
        })
    }
}

fn config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir().map(|home| home.join(".config"));

    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();

    base.unwrap_or_else(|| PathBuf::from("."))
        .join("terraprep")
}
