use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use selfup_core::UpdaterConfig;
use selfup_platform::{AppPaths, Platform};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the release manifests.
    #[serde(default)]
    pub api_url: String,

    /// Base URL of full binaries; falls back to `api_url`.
    #[serde(default)]
    pub bin_url: Option<String>,

    /// Base URL of binary patches; falls back to `api_url`.
    #[serde(default)]
    pub diff_url: Option<String>,

    #[serde(default = "default_cmd_name")]
    pub cmd_name: String,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub platform: Option<Platform>,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_cmd_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("update")
}

fn default_read_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            bin_url: None,
            diff_url: None,
            cmd_name: default_cmd_name(),
            state_dir: default_state_dir(),
            platform: None,
            read_timeout_secs: default_read_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Settings {
    /// Load the settings file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed;
    /// callers fall back to the defaults and report it once logging is set up.
    pub fn load() -> Result<Self, SettingsError> {
        let Ok(paths) = AppPaths::new() else {
            return Ok(Self::default());
        };
        Self::load_from_path(&paths.settings_file())
    }

    fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        let path = paths.settings_file();
        self.save_to_path(&path)?;
        Ok(path)
    }

    fn save_to_path(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_config(&self, current_version: &str) -> UpdaterConfig {
        let mut config = UpdaterConfig::new(&self.cmd_name, current_version, &self.api_url)
            .with_state_dir(&self.state_dir);
        if let Some(bin_url) = &self.bin_url {
            config = config.with_bin_url(bin_url);
        }
        if let Some(diff_url) = &self.diff_url {
            config = config.with_diff_url(diff_url);
        }
        if let Some(platform) = &self.platform {
            config = config.with_platform(platform.clone());
        }
        config
    }
}
