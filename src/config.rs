use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;

/// Tunables read from an optional TOML file. Every field has a default, so
/// an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory partitions are mounted on
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// User whose password is replaced
    #[serde(default = "default_user")]
    pub user: String,

    /// Wifi regulatory domain. Countries differ in allocation of 5GHz
    /// channels, see ISO 3166.
    #[serde(default = "default_wifi_country")]
    pub wifi_country: String,

    /// Show dd progress while copying partitions
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_mount_point() -> PathBuf {
    PathBuf::from(paths::MOUNT_TARGET)
}

fn default_user() -> String {
    paths::DEFAULT_USER.to_string()
}

fn default_wifi_country() -> String {
    paths::DEFAULT_WIFI_COUNTRY.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            user: default_user(),
            wifi_country: default_wifi_country(),
            progress: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid settings: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mount_point.is_absolute() {
            return Err(Error::Config(format!(
                "mount_point must be an absolute path, got {}",
                self.mount_point.display()
            )));
        }

        if self.user.is_empty() || self.user.contains(':') || self.user.contains('\n') {
            return Err(Error::Config(format!("invalid user name '{}'", self.user)));
        }

        if self.wifi_country.len() != 2
            || !self.wifi_country.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(Error::Config(format!(
                "wifi_country must be a two letter ISO 3166 code, got '{}'",
                self.wifi_country
            )));
        }

        Ok(())
    }
}
